//! The `analyze` command: submit, wait, animate, report.

use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::tty::IsTty;
use crossterm::{execute, queue};
use factshield_core::types::AnalysisResult;
use factshield_core::{
    AnalysisOrchestrator, FactShieldConfig, FactorKind, InputKind, RequestState, ScoreCategory,
    categorize, group_factors,
};
use std::io::Write;
use std::time::Duration;
use tracing::debug;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub kind: InputKind,
    pub json: bool,
    pub quiet: bool,
}

pub async fn run(input: &str, config: &FactShieldConfig, options: RunOptions) -> anyhow::Result<()> {
    let mut config = config.clone();
    let interactive = std::io::stdout().is_tty() && !options.quiet;
    if !interactive {
        config.display.animated = false;
    }

    let orchestrator = AnalysisOrchestrator::from_config(&config)?;
    let mut states = orchestrator.subscribe();

    orchestrator
        .submit(input, options.kind)
        .map_err(|e| anyhow::anyhow!("{}", e.message()))?;

    let mut spinner = tokio::time::interval(Duration::from_millis(120));
    let mut frame = 0usize;
    let settled = loop {
        tokio::select! {
            state = states.recv() => match state {
                Some(state) if state.is_settled() => break state,
                Some(_) => {}
                None => anyhow::bail!("Analysis was abandoned"),
            },
            _ = spinner.tick(), if interactive => {
                let mut err = std::io::stderr();
                execute!(
                    err,
                    MoveToColumn(0),
                    Clear(ClearType::CurrentLine),
                    Print(format!("  {} Analyzing...", SPINNER[frame % SPINNER.len()]))
                )?;
                frame += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                orchestrator.reset();
                if interactive {
                    execute!(std::io::stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine))?;
                }
                anyhow::bail!("Analysis cancelled");
            }
        }
    };
    if interactive {
        execute!(std::io::stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    }

    match settled {
        RequestState::Succeeded(result) => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(result.as_ref())?);
                return Ok(());
            }
            if interactive && config.display.animated {
                animate_score(&orchestrator, config.display.tick_interval_ms).await?;
            }
            print!("{}", render_report(&result, config.display.show_empty_sections));
            Ok(())
        }
        RequestState::Failed(err) => {
            anyhow::bail!("Analysis failed ({}): {}", err.kind(), err)
        }
        other => {
            debug!(state = ?other.status(), "Unexpected settled state");
            anyhow::bail!("Analysis ended in an unexpected state")
        }
    }
}

/// Redraw the score line until the display value reaches the result.
async fn animate_score(orchestrator: &AnalysisOrchestrator, tick_ms: u64) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    let mut redraw = tokio::time::interval(Duration::from_millis(tick_ms));
    loop {
        redraw.tick().await;
        let shown = orchestrator.current_display_score();
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("  Credibility score: {shown:>3}"))
        )?;
        out.flush()?;
        if orchestrator.display().is_settled() {
            break;
        }
    }
    execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    Ok(())
}

fn category_color(category: ScoreCategory) -> Color {
    match category {
        ScoreCategory::VeryReliable => Color::Green,
        ScoreCategory::MostlyReliable => Color::DarkGreen,
        ScoreCategory::SomewhatReliable => Color::Yellow,
        ScoreCategory::PotentiallyMisleading => Color::DarkYellow,
        ScoreCategory::LikelyFalse => Color::Red,
    }
}

fn factor_marker(kind: FactorKind) -> crossterm::style::StyledContent<&'static str> {
    match kind {
        FactorKind::Positive => "+".with(Color::Green),
        FactorKind::Negative => "!".with(Color::Red),
        FactorKind::Neutral => "i".with(Color::Blue),
    }
}

/// Render the final report: score, label, article details and factors.
pub fn render_report(result: &AnalysisResult, show_empty_sections: bool) -> String {
    let categorization = categorize(result.score);
    let color = category_color(categorization.category);

    let mut out = String::new();
    out.push_str(&format!(
        "  Credibility score: {}/100  {}\n",
        result.score.to_string().with(color).bold(),
        categorization.label.with(color)
    ));
    if let Some(title) = &result.title {
        out.push_str(&format!("  Title:  {title}\n"));
    }
    if let Some(host) = result.source_host() {
        out.push_str(&format!("  Source: {host}\n"));
    }

    let groups = group_factors(&result.factors);
    for section in groups.sections(show_empty_sections) {
        out.push_str(&format!("\n  {}\n", section.title.bold()));
        if section.factors.is_empty() {
            out.push_str("    (none)\n");
        }
        for factor in section.factors {
            out.push_str(&format!(
                "    {} {}\n      {}\n",
                factor_marker(section.kind),
                factor.title,
                factor.description.as_str().dark_grey()
            ));
        }
    }
    out
}
