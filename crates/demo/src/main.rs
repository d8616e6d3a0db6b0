#![deny(unsafe_code)]
//! Whetstone demo binary.
//!
//! Runs a self-contained template optimization:
//! 1. Load configuration, corpus and candidate mutations
//! 2. Score the pristine templates for a baseline
//! 3. Apply each candidate, keeping strict improvements only
//! 4. Print the report and resume from the persisted state
//!
//! No external services required -- documents are rendered from the
//! templates by a deterministic stand-in generator.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use whetstone_corpus::{Corpus, TemplateRenderGenerator};
use whetstone_mutation::MutationList;
use whetstone_optimizer::{
    MutationOptimizer, OptimizationState, OptimizerConfig, OptimizerError, Round, RunLayout,
    StopReason,
};
use whetstone_rubric::presets;

// ── Formatting Helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║                 Whetstone  --  Demo                          ║
 ║                                                              ║
 ║   Keep-or-discard hill climbing over template mutations,     ║
 ║   scored by a weighted rubric with snapshot rollback.        ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .init();

    println!("{}", BANNER);

    if let Err(e) = run_demo().await {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {}", e);
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    // ── Phase A: Inputs ─────────────────────────────────────────────
    section("Phase A: Inputs");

    let workspace = tempfile::tempdir()?;
    let baseline_dir = workspace.path().join("templates");
    fixtures::write_templates(&baseline_dir)?;
    let layout = RunLayout::in_run_dir(&baseline_dir, workspace.path().join("run"));
    ok(&format!("Templates        : {}", baseline_dir.display()));
    ok(&format!("Run directory    : {}", layout.run_dir.display()));

    let config = OptimizerConfig::from_toml_str(fixtures::CONFIG_TOML)?;
    info(&format!(
        "Config           : window={}  threshold={:.2}  concurrency={}  timeout={}ms",
        config.convergence_window,
        config.convergence_threshold,
        config.max_concurrency,
        config.generation_timeout_ms
    ));

    let corpus = Corpus::from_yaml_str(fixtures::CORPUS_YAML)?;
    info(&format!("Corpus           : {} cases (version {})", corpus.len(), corpus.version()));

    let mutations = MutationList::from_yaml_str(fixtures::MUTATIONS_YAML)?;
    info(&format!("Candidates       : {}", mutations.len()));

    let scorer = presets::one_pager()?;
    info(&format!(
        "Rubric           : one-pager ({})",
        scorer.criterion_names().collect::<Vec<_>>().join(", ")
    ));

    let generator = Arc::new(TemplateRenderGenerator::new().with_latency(Duration::from_millis(15)));
    let mut optimizer = MutationOptimizer::new(
        config.clone(),
        layout.clone(),
        scorer,
        corpus.clone(),
        generator.clone(),
    )?;
    optimizer.validate_mutations(&mutations)?;

    // ── Phase B: Baseline ───────────────────────────────────────────
    section("Phase B: Baseline");

    let state = optimizer.establish_baseline().await?;
    print_criteria(state);

    // ── Phase C: Rounds ─────────────────────────────────────────────
    section(&format!("Phase C: Rounds  ({} candidates)", mutations.len()));

    // Stop before the last candidate; Phase E picks it up after a resume.
    let held_back = mutations.len().saturating_sub(1);
    for mutation in mutations.iter().take(held_back) {
        let round = optimizer.step(mutation).await?;
        print_round(&round);
    }

    // ── Phase D: Report ─────────────────────────────────────────────
    section("Phase D: Report (interim)");

    let report = optimizer.report(StopReason::Cancelled)?;
    info(&format!("Baseline score   : {:.3}", report.baseline_score));
    info(&format!("Current score    : {:.3}", report.final_score));
    info(&format!(
        "Improvement      : {:+.3} ({:+.1}%)",
        report.absolute_improvement, report.percent_improvement
    ));
    info(&format!("Kept / discarded : {} / {}", report.kept, report.discarded));
    for (code, count) in &report.discards_by_reason {
        info(&format!("  discarded ({:<16}) : {}", code, count));
    }
    if report.diminishing_returns {
        warn("Diminishing returns over the trailing window");
    }
    drop(optimizer);

    // ── Phase E: Resume ─────────────────────────────────────────────
    section("Phase E: Resume From Persisted State");

    let mut resumed = MutationOptimizer::new(config, layout.clone(), presets::one_pager()?, corpus, generator)?;
    let state = resumed.resume()?;
    ok(&format!(
        "Resumed at round {}  score={:.3}",
        state.current_round, state.current_score
    ));

    let report = resumed.run(&mutations).await?;
    if let Some(last) = report.rows.last() {
        info(&format!(
            "Round {:>2}  {:<22} {}",
            last.round,
            last.mutation,
            last.reason.as_deref().unwrap_or(&last.decision)
        ));
    }
    ok(&format!("Stopped          : {}", report.stop_reason.describe()));
    ok(&format!("Report written   : {}", layout.report_markdown_path().display()));

    println!();
    for line in report.to_markdown().lines() {
        println!("   {}", line);
    }

    match resumed.run(&mutations).await {
        Err(OptimizerError::InvalidPhase(phase)) => ok(&format!("Finished run rejects further rounds ({})", phase)),
        Err(e) => return Err(e.into()),
        Ok(_) => warn("Finished run accepted another pass"),
    }

    Ok(())
}

fn print_criteria(state: &OptimizationState) {
    ok(&format!("Baseline score   : {:.3}", state.baseline_score));
    for (name, score) in &state.baseline_per_criterion {
        info(&format!("  {:<14} {:.3}", name, score));
    }
}

fn print_round(round: &Round) {
    let label = format!("Round {:>2}  {:<22}", round.round_number, round.mutation.name);
    match (round.decision.reason(), round.new_score) {
        (None, Some(score)) => ok(&format!(
            "{} keep     {:.3} -> {:.3}  ({:+.3})",
            label, round.previous_score, score, round.improvement
        )),
        (Some(reason), Some(score)) => info(&format!(
            "{} discard  {:.3} -> {:.3}  [{}]",
            label,
            round.previous_score,
            score,
            reason.code()
        )),
        (Some(reason), None) => warn(&format!("{} discard  [{}]", label, reason.code())),
        (None, None) => warn(&format!("{} keep without a score", label)),
    }
    if round.diminishing_returns {
        warn("         diminishing returns");
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
