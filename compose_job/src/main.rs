//! Orchestration entry point (spec §4.10-§4.11): parses per-invocation CLI
//! flags, loads deployment-wide paths from the environment, and runs the
//! composition pipeline to completion.

mod cli;
mod config;
mod error;
mod fs_source;
mod pipeline;

use cli::Cli;
use config::EnvConfig;
use std::process::ExitCode;
use types::PipelineConfig;

fn build_pipeline_config(cli: &Cli, env: EnvConfig) -> PipelineConfig {
    let output_path = env.published_root.join("meeting.mp4");
    PipelineConfig {
        meeting_id: cli.meeting_id.clone(),
        published_root: env.published_root,
        scratch_root: env.scratch_root,
        video_root: env.video_root,
        output_path,
        flags: env.flags,
        layout: env.layout,
        constant_rate_factor: env.constant_rate_factor,
        cpu_threads: env.cpu_threads,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse(std::env::args()) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    // Only presentation recordings get composed; anything else is a
    // silent no-op success (spec §6).
    if cli.format != "presentation" {
        return ExitCode::SUCCESS;
    }

    let env: EnvConfig = match compose_app::create_app_context(!cli.log_stdout) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("failed to load environment configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let config = build_pipeline_config(&cli, env);

    match pipeline::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "composition pipeline failed");
            e.exit_code()
        }
    }
}
