//! Menu-driven mode, used when no subcommand is given.

use dialoguer::{Confirm, Input, Select};

use client_map_cli_utils::MultiProgress;
use client_map_pipeline::PipelineConfig;

use crate::commands::{self, RunOverrides};

enum Action {
    RunMap,
    CacheStats,
    ShowConfig,
}

impl Action {
    const ALL: &[Self] = &[Self::RunMap, Self::CacheStats, Self::ShowConfig];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunMap => "Build the client map",
            Self::CacheStats => "Show geocode cache stats",
            Self::ShowConfig => "Show configuration",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run(
    multi: &MultiProgress,
    mut config: PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Client Map");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::RunMap => {
            prompt_overrides(&config)?.apply(&mut config)?;
            commands::run_map(multi, &config).await?;
        }
        Action::CacheStats => commands::cache_stats(&config.cache.path)?,
        Action::ShowConfig => commands::print_config(&config)?,
    }

    Ok(())
}

fn prompt_overrides(config: &PipelineConfig) -> Result<RunOverrides, Box<dyn std::error::Error>> {
    let region: String = Input::new()
        .with_prompt("Region code")
        .default(config.region.code.clone())
        .interact_text()?;

    let retry_unresolved = Confirm::new()
        .with_prompt("Retry cities previously cached as unresolved?")
        .default(config.cache.retry_unresolved)
        .interact()?;

    let flush_every = prompt_optional_usize("Flush cache every N lookups (empty to flush at end)")?;

    Ok(RunOverrides {
        region: Some(region.trim().to_string()),
        retry_unresolved,
        flush_every,
        ..RunOverrides::default()
    })
}

/// Returns `None` if the input is empty.
fn prompt_optional_usize(prompt: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
