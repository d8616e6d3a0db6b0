//! Sample inputs for the demo run.
//!
//! A deliberately weak one-pager template set, a three-case corpus, and an
//! ordered candidate list that exercises every round outcome: kept,
//! discarded for no improvement, and discarded because an edit could not
//! be applied.

use std::path::Path;

pub const CONFIG_TOML: &str = r#"
max_concurrency = 3
generation_timeout_ms = 5000
convergence_window = 3
convergence_threshold = 0.05
"#;

pub const CORPUS_YAML: &str = r#"
version: "2026-10"
cases:
  - id: checkout
    description: Mobile checkout redesign
    fields:
      product: Mobile checkout
      audience: customers
  - id: onboarding
    description: First-run onboarding flow
    fields:
      product: Onboarding
      audience: new users
  - id: billing
    description: Self-serve billing portal
    fields:
      product: Billing portal
      audience: finance stakeholders
"#;

pub const MUTATIONS_YAML: &str = r###"
mutations:
  - name: concrete-problem
    target_criterion: clarity
    description: Replace the vague problem verb with a measured symptom
    edits:
      - target_file: system.md
        kind: replace_pattern
        pattern: "needs to improve"
        replacement: "loses 12% of sessions"
  - name: drop-buzzwords
    target_criterion: clarity
    edits:
      - target_file: sections/solution.md
        kind: replace_pattern
        pattern: "leverage better tooling to optimize the flow"
        replacement: "cut checkout steps from 5 to 2"
  - name: add-goals-section
    target_criterion: structure
    edits:
      - target_file: sections/solution.md
        kind: append_to_end
        content: "\n# Goals\nReduce abandonment from 12% to 6% within 2 quarters."
  - name: add-timeline-heading
    target_criterion: structure
    description: Targets a heading the templates do not have
    edits:
      - target_file: sections/solution.md
        kind: replace_pattern
        pattern: "^## Timeline"
        replacement: "## Milestones"
  - name: marketing-tagline
    target_criterion: clarity
    edits:
      - target_file: system.md
        kind: insert_at_line
        line: 1
        content: "Built to enhance engagement and unlock synergy."
  - name: add-risks
    target_criterion: scope
    edits:
      - target_file: sections/solution.md
        kind: append_to_end
        content: "Risks: payment provider limits. Non-goals: desktop redesign."
  - name: reword-risks
    target_criterion: scope
    edits:
      - target_file: sections/solution.md
        kind: replace_pattern
        pattern: "Risks:"
        replacement: "Known risks:"
"###;

const SYSTEM_TEMPLATE: &str = "# Problem\n{{product}} needs to improve for {{audience}}.\n";
const SOLUTION_TEMPLATE: &str = "# Solution\nWe will leverage better tooling to optimize the flow.\n";

/// Write the baseline template set into `dir`.
pub fn write_templates(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir.join("sections"))?;
    std::fs::write(dir.join("system.md"), SYSTEM_TEMPLATE)?;
    std::fs::write(dir.join("sections/solution.md"), SOLUTION_TEMPLATE)?;
    Ok(())
}
