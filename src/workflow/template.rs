//! Default workflow written by `flowgate init`.

/// File name used by `flowgate init` and workflow discovery.
pub const DEFAULT_WORKFLOW_FILE: &str = "flowgate.yml";

/// Spec-driven lifecycle with a starter rule catalog.
pub const DEFAULT_WORKFLOW: &str = r#"# flowgate workflow
version: "1.0"
initialState: To Do
roles: [pm, arch, dev, qa, sre]

states:
  - name: To Do
    description: Work not yet started
  - name: Assessed
    description: Complexity and approach assessed
  - name: Specified
    description: Product requirements written
  - name: Researched
    description: Optional market and technical research done
  - name: Planned
    description: Architecture and platform decisions recorded
  - name: In Implementation
    description: Code being written
  - name: Validated
    description: Tests, review and security checks passed
  - name: Deployed
    description: Released to production
  - name: Done
    description: Work complete
    terminal: true

phases:
  assess:
    description: Assess complexity and pick a workflow depth
    inputStates: [To Do]
    outputState: Assessed
    roles: [pm, arch]
  specify:
    description: Write the PRD
    inputStates: [To Do, Assessed]
    outputState: Specified
    roles: [pm]
  research:
    description: Research the problem space
    inputStates: [Specified]
    outputState: Researched
    roles: [pm, arch]
    advisoryOnly: true
  plan:
    description: Record architecture decisions
    inputStates: [Specified, Researched]
    outputState: Planned
    roles: [arch]
  implement:
    description: Implement the plan
    inputStates: [Planned]
    outputState: In Implementation
    roles: [dev]
  validate:
    description: Test, review and verify acceptance criteria
    inputStates: [In Implementation]
    outputState: Validated
    roles: [qa, dev]
  deploy:
    description: Release to production
    inputStates: [Validated]
    outputState: Deployed
    roles: [sre]
    emergencyFrom: [In Implementation]
  close:
    description: Close the task
    inputStates: [Deployed]
    outputState: Done
    roles: [pm]

rules:
  - code: PRD-001
    description: A PRD exists before planning
    severity: blocking
    phases: [plan]
    check: { kind: artifact, pattern: "docs/prd/*.md" }
    remediation: Run the specify phase to write docs/prd/<feature>.md
  - code: ADR-001
    description: An ADR exists before implementation
    severity: blocking
    phases: [implement]
    check: { kind: artifact, pattern: "docs/adr/*.md" }
    remediation: Run the plan phase to record an ADR under docs/adr/
  - code: AC-001
    description: Acceptance criteria are all checked before validation
    severity: blocking
    phases: [validate]
    check: { kind: checklist, allowEmpty: false }
    remediation: Complete and check every acceptance criterion on the task
  - code: LOG-001
    description: Decisions are logged
    severity: advisory
    phases: all
    check: { kind: log, pattern: ".logs/decisions/*.jsonl" }
    remediation: Append decisions to .logs/decisions/<session>.jsonl

enforcement:
  phases:
    research: warn
"#;
