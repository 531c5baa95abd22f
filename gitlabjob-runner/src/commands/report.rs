//! Terminal rendering of run reports

use colored::*;
use gitlabjob_core::domain::report::{Decision, ProjectReport, RunReport};

use crate::orchestrator::Mode;

/// Print a run report, one block per project
pub fn print_run_report(report: &RunReport, mode: Mode) {
    if report.projects.is_empty() && report.rejected.is_empty() {
        println!("{}", "No projects to visit.".yellow());
        return;
    }

    for project in &report.projects {
        print_project(project, mode);
    }

    for (raw, reason) in &report.rejected {
        println!("  {} Project '{}': {}", "✗".red(), raw, reason.red());
    }

    if mode == Mode::Execute {
        let outcomes = report.outcomes();
        println!();
        println!("{}", format!("Played {} job(s)", outcomes.len()).bold());
        for (job, status) in outcomes {
            println!("    {} → {}", job, colorize_status(status));
        }
    }

    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!("{}", format!("Finished in {}s", elapsed.num_seconds()).dimmed());
    }
}

fn print_project(project: &ProjectReport, mode: Mode) {
    println!();
    println!("{} Project {}", "▸".cyan(), project.project_id.to_string().bold());

    if let Some(dedup) = &project.dedup {
        let line = format!(
            "{} pipeline(s) deleted in {} pass(es)",
            dedup.deleted_ids().len(),
            dedup.passes
        );
        if dedup.is_clean() {
            println!("    Dedup:  {}", line.dimmed());
        } else {
            println!("    Dedup:  {}", line);
        }
        let refused = dedup.failed();
        if !refused.is_empty() {
            println!("    {}", format!("{} deletion(s) refused", refused.len()).red());
        }
        if !dedup.converged {
            println!("    {}", "did not converge".red());
        }
    }

    if let Some(failure) = &project.failure {
        println!("    {}", failure.red());
        return;
    }

    if mode == Mode::DedupOnly {
        return;
    }

    if project.jobs.is_empty() {
        println!("    {}", "No manual jobs.".yellow());
    }
    for job in &project.jobs {
        println!(
            "    Job {}: {}",
            job.job_id.to_string().dimmed(),
            colorize_decision(&job.decision)
        );
    }
}

fn colorize_decision(decision: &Decision) -> ColoredString {
    let text = decision.to_string();
    match decision {
        Decision::Dispatched { status: 200 } | Decision::Admitted => text.green(),
        Decision::Dispatched { .. } => text.yellow(),
        Decision::Ineligible { .. } => text.normal(),
        Decision::NotEvaluated { .. } => text.red(),
    }
}

fn colorize_status(status: u16) -> ColoredString {
    if (200..300).contains(&status) {
        status.to_string().green()
    } else {
        status.to_string().red()
    }
}
