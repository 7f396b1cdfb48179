use anyhow::{bail, Context};
use geofence_editor::prelude::*;

const PLACEHOLDER_TOKEN: &str = "headless-demo";

/// Runs one editing session against the headless engine and prints the
/// confirmed geofence as JSON.
///
/// Usage: `geofence-app [LAT LNG [RADIUS_METERS]] [--config FILE]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    geofence_editor::init_logging();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = match &args.config_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path))?;
            EditorConfig::from_json_str(&json)?
        }
        None => EditorConfig::default(),
    }
    .with_env_overrides();
    let config = if config.access_token.is_some() {
        config
    } else {
        log::info!("no map credential configured, using a placeholder");
        config.with_access_token(PLACEHOLDER_TOKEN)
    };

    let default_center = config.map.default_center;
    let recorder = EngineRecorder::new();
    let engine_recorder = recorder.clone();
    let (session, handle) = EditorSession::open(
        config,
        EditorOptions::default(),
        move |events| Box::new(HeadlessEngineFactory::new(engine_recorder).with_events(events)),
        None,
        EditorCallbacks::new(
            |config| log::info!("confirmed {:?}", config),
            || log::info!("session cancelled"),
        ),
    )?;

    if let Some(error) = session.editor().map_error() {
        bail!("map failed to start: {}", error);
    }

    handle.click(args.center.unwrap_or(default_center))?;
    handle.set_radius(args.radius_meters)?;
    handle.confirm()?;

    match session.run().await {
        SessionOutcome::Confirmed(geofence) => {
            log::info!(
                "{} engine calls, inside own boundary: {}",
                recorder.calls().len(),
                geofence.contains(&geofence.center)
            );
            println!("{}", serde_json::to_string_pretty(&geofence)?);
            Ok(())
        }
        SessionOutcome::Cancelled => bail!("session ended without a geofence"),
    }
}

#[derive(Debug)]
struct Args {
    /// Falls back to the loaded config's default center when absent
    center: Option<Location>,
    radius_meters: f64,
    config_path: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut config_path = None;
        while let Some(arg) = args.next() {
            if arg == "--config" {
                config_path = Some(args.next().context("--config needs a path")?);
            } else {
                positional.push(arg.parse::<f64>().with_context(|| format!("not a number: {}", arg))?);
            }
        }

        let (center, radius_meters) = match positional.as_slice() {
            [] => (None, 100.0),
            [lat, lng] => (Some(Location::new(*lat, *lng)), 100.0),
            [lat, lng, radius] => (Some(Location::new(*lat, *lng)), *radius),
            _ => bail!("expected LAT LNG [RADIUS_METERS]"),
        };
        if let Some(center) = center.filter(|center| !center.is_valid()) {
            bail!("center ({}, {}) is out of range", center.lat, center.lng);
        }

        Ok(Self {
            center,
            radius_meters,
            config_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_center_defaults_to_config() {
        let args = parse(&["--config", "fence.json"]).unwrap();
        assert_eq!(args.center, None);
        assert_eq!(args.config_path.as_deref(), Some("fence.json"));

        let config = EditorConfig::from_json_str(
            r#"{"map": {"default_center": {"lat": 19.076, "lng": 72.8777}}}"#,
        )
        .unwrap();
        assert_eq!(
            args.center.unwrap_or(config.map.default_center),
            Location::new(19.076, 72.8777)
        );
    }

    #[test]
    fn test_explicit_center_wins() {
        let args = parse(&["12.97", "77.59", "250"]).unwrap();
        assert_eq!(args.center, Some(Location::new(12.97, 77.59)));
        assert_eq!(args.radius_meters, 250.0);
        assert!(parse(&["95", "0"]).is_err());
        assert!(parse(&["1"]).is_err());
    }
}
