//! Status command - show who the token belongs to and their presence.

use chrono::Utc;
use console::style;

use kp_api::Presence;
use kp_core::config::AppConfig;
use kp_core::error::KpResult;
use kp_core::session::UserId;

use crate::OutputFormat;

/// Run the status command.
pub async fn run(config: AppConfig, format: OutputFormat) -> KpResult<()> {
    let api = super::create_api_client(&config)?;

    let identity = api.auth_test().await?;
    let user = UserId::new(identity.user_id.clone());
    let snapshot = api.users_get_presence(&user).await?;

    let last_activity = snapshot.last_activity_time();
    let idle_minutes = snapshot.minutes_since_activity(Utc::now());

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "user_id": identity.user_id,
                "user": identity.user,
                "team": identity.team,
                "presence": snapshot.presence.to_string(),
                "manual_away": snapshot.manual_away,
                "online": snapshot.online,
                "auto_away": snapshot.auto_away,
                "connection_count": snapshot.connection_count,
                "last_activity": last_activity.map(|t| t.to_rfc3339()),
                "minutes_since_activity": idle_minutes,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("{}", style("Account").bold().underlined());
            println!(
                "  User:      {} ({})",
                identity.user.as_deref().unwrap_or("unknown"),
                identity.user_id
            );
            println!("  Team:      {}", identity.team.as_deref().unwrap_or("unknown"));

            println!();
            println!("{}", style("Presence").bold().underlined());
            let presence = match snapshot.presence {
                Presence::Active => style("active").green().to_string(),
                Presence::Away if snapshot.manual_away => {
                    style("away (manual)").yellow().to_string()
                }
                Presence::Away => style("away").red().to_string(),
                Presence::Unknown => style("unknown").dim().to_string(),
            };
            println!("  Status:    {presence}");
            if let Some(online) = snapshot.online {
                println!("  Online:    {online}");
            }
            if let Some(count) = snapshot.connection_count {
                println!("  Clients:   {count}");
            }
            if let Some(at) = last_activity {
                println!("  Last seen: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(minutes) = idle_minutes {
                println!("  Idle:      {minutes:.1} min");
            }
        }
    }

    Ok(())
}
