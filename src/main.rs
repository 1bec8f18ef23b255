use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use onboarding_engine::config::EngineConfig;
use onboarding_engine::onboarding::{
    Catalog, OnboardingEvent, OnboardingManager, StatePatch, spawn_autosave_task,
};
use onboarding_engine::store::LibSqlStore;

const HELP: &str = "\
Commands:
  status                 show current step and progress
  steps                  list all steps with their status
  next | prev            move the step pointer
  goto N                 jump to step N (1-based)
  start ID               mark a step in progress
  complete ID | skip ID  resolve a step
  validate ID            run the step's validity check
  set business|industry|features JSON
                         replace one of the free-form records
  claim MILESTONE REWARD claim a milestone reward
  pause | resume
  save | load | reset
  quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env()?;

    eprintln!("🧭 Onboarding engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Auto-save: every {}s", config.autosave_interval.as_secs());
    eprintln!("   Type 'help' for commands.\n");

    let store = Arc::new(LibSqlStore::new_local(&config.db_path, config.user_id.clone()).await?);
    let manager = Arc::new(OnboardingManager::new(
        Arc::new(Catalog::default()),
        store,
        &config,
    ));

    if manager.load_progress().await {
        eprintln!("   Resumed saved progress");
    }

    let autosave = spawn_autosave_task(Arc::clone(&manager), config.autosave_interval);

    // Print unlocks as they happen
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(OnboardingEvent::MilestoneUnlocked { milestone_id }) => {
                    eprintln!("🏁 Milestone unlocked: {}", milestone_id);
                }
                Ok(OnboardingEvent::AchievementUnlocked {
                    achievement_id,
                    points,
                }) => {
                    eprintln!("🏆 Achievement unlocked: {} (+{} pts)", achievement_id, points);
                }
                Ok(OnboardingEvent::OnboardingCompleted) => {
                    eprintln!("🎉 All required steps completed");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    print_status(&manager).await;
    eprint!("> ");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if matches!(line, "quit" | "exit" | "/quit") {
            break;
        }
        handle_command(&manager, line).await;
        eprint!("> ");
    }

    autosave.stop();
    if manager.is_dirty() {
        manager.save_progress().await;
    }
    Ok(())
}

async fn handle_command(manager: &OnboardingManager, line: &str) {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "help" => eprintln!("{HELP}"),
        "status" => print_status(manager).await,
        "steps" => print_steps(manager).await,
        "next" => {
            manager.next_step().await;
            print_status(manager).await;
        }
        "prev" => {
            manager.previous_step().await;
            print_status(manager).await;
        }
        "goto" => match rest.parse::<usize>() {
            Ok(n) if n > 0 => {
                manager.go_to_step(n - 1).await;
                print_status(manager).await;
            }
            _ => eprintln!("Usage: goto N (1-based)"),
        },
        "start" | "complete" | "skip" | "validate" if rest.is_empty() => {
            eprintln!("Usage: {command} STEP_ID");
        }
        "start" => {
            manager.start_step(rest).await;
            print_status(manager).await;
        }
        "complete" => {
            let validation = manager.validate_step(rest).await;
            for error in &validation.errors {
                eprintln!("⚠️  {}", error);
            }
            manager.complete_step(rest).await;
            print_status(manager).await;
        }
        "skip" => {
            if manager.catalog().step(rest).is_some_and(|s| !s.is_optional) {
                eprintln!("⚠️  {} is required; skipping anyway", rest);
            }
            manager.skip_step(rest).await;
            print_status(manager).await;
        }
        "validate" => {
            let validation = manager.validate_step(rest).await;
            if validation.is_valid() {
                eprintln!("✅ {} is valid", rest);
            } else {
                for error in &validation.errors {
                    eprintln!("❌ {}", error);
                }
            }
        }
        "set" => {
            let (field, json) = rest.split_once(' ').unwrap_or((rest, ""));
            let value: serde_json::Value = match serde_json::from_str(json) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("Invalid JSON: {}", e);
                    return;
                }
            };
            let patch = match field {
                "business" => StatePatch::business_info(value),
                "industry" => StatePatch::industry_selection(value),
                "features" => StatePatch::feature_configuration(value),
                _ => {
                    eprintln!("Usage: set business|industry|features JSON");
                    return;
                }
            };
            manager.update_state(patch).await;
        }
        "claim" => match rest.split_once(' ') {
            Some((milestone, reward)) => {
                if manager.claim_reward(milestone, reward.trim()).await {
                    eprintln!("🎁 Claimed {}", reward.trim());
                } else {
                    eprintln!("Reward not claimable");
                }
            }
            None => eprintln!("Usage: claim MILESTONE REWARD"),
        },
        "pause" => {
            manager.set_paused(true).await;
            eprintln!("⏸  Paused");
        }
        "resume" => {
            manager.set_paused(false).await;
            eprintln!("▶️  Resumed");
        }
        "save" => {
            if manager.save_progress().await {
                eprintln!("💾 Saved");
            } else {
                eprintln!("Progress wasn't saved; will retry on the next auto-save");
            }
        }
        "load" => {
            if manager.load_progress().await {
                print_status(manager).await;
            } else {
                eprintln!("No saved progress");
            }
        }
        "reset" => {
            manager.reset_progress().await;
            print_status(manager).await;
        }
        _ => eprintln!("Unknown command '{}'. Type 'help'.", command),
    }
}

async fn print_status(manager: &OnboardingManager) {
    let state = manager.get_state().await;
    let catalog = manager.catalog();

    if let Some(step) = catalog.step_at(state.current_step_index) {
        eprintln!(
            "Step {}/{}: {} [{}]",
            state.current_step_index + 1,
            state.total_steps,
            step.title,
            state.step_status(&step.id)
        );
        let unmet = manager.unmet_dependencies(&step.id).await;
        if !unmet.is_empty() {
            eprintln!("   Suggested first: {}", unmet.join(", "));
        }
    }

    eprintln!(
        "Progress: {}%  |  Points: {}  |  ~{} min left  |  {:.1} min spent",
        manager.calculate_progress().await,
        manager.total_points().await,
        manager.estimated_minutes_remaining().await,
        state.progress.time_spent
    );
    if let Some(current) = &state.progress.current_milestone {
        eprintln!("Milestone: {} ({}%)", current.id, current.progress);
    }
    if state.is_completed {
        eprintln!("Onboarding complete");
    }
}

async fn print_steps(manager: &OnboardingManager) {
    let state = manager.get_state().await;
    for (i, step) in manager.catalog().steps.iter().enumerate() {
        let marker = if i == state.current_step_index { "▸" } else { " " };
        let optional = if step.is_optional { " (optional)" } else { "" };
        eprintln!(
            "{} {}. {:<24} {:<12} {}{}",
            marker,
            i + 1,
            step.id,
            state.step_status(&step.id).to_string(),
            step.step_type,
            optional
        );
    }
}
