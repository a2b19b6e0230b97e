use anyhow::Context;
use clap::Parser;
use fs_err as fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mockup_gen::cli::{Args, Command};
use mockup_gen::config::{Config, EnvironmentCapabilities};
use mockup_gen::log::Transcripts;
use mockup_gen::pipeline::Pipeline;
use mockup_gen::wire::{EditScreenInput, GenerateManifestInput, GenerateScreenInput};
use mockup_gen::{provider, server, store, ux};

fn init_tracing(debug: bool) {
    let default = if debug { "mockup_gen=debug,tower_http=debug" } else { "mockup_gen=info,tower_http=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(p) = args.provider {
        cfg.provider = p;
    }
    if let Some(m) = &args.model {
        cfg.model = m.clone();
    }
    if let Some(t) = args.timeout_secs {
        cfg.timeout_secs = t;
    }
    cfg.save_transcripts |= args.save_transcripts;

    let caps = EnvironmentCapabilities::from_env(&cfg);
    let gateway = provider::make_gateway(&cfg, caps.model_credential.clone())?;
    let db = store::connect(caps.database_url.as_deref());
    let mut pipeline = Pipeline::new(caps, gateway, db);
    if cfg.save_transcripts {
        pipeline = pipeline.with_transcripts(Transcripts::new(cfg.artifacts_root()));
    }

    match args.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.bind.clone());
            server::serve(Arc::new(pipeline), &bind).await?;
        }
        Command::Manifest { prompt, device, theme, project_id, old_screen } => {
            let input = GenerateManifestInput {
                user_input: prompt,
                device_type: device.into(),
                project_id: project_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                old_screen_description: old_screen,
                theme,
            };
            let out = pipeline.generate_manifest(&input).await?;
            ux::show_manifest(&out);
            println!("{}", serde_json::to_string_pretty(&out.value)?);
        }
        Command::Screen { project_id, screen_id, name, purpose, description } => {
            let input = GenerateScreenInput {
                project_id,
                screen_id,
                screen_name: name,
                purpose,
                screen_description: description,
            };
            let out = pipeline.generate_screen_markup(&input).await?;
            ux::show_screen(&out);
            println!("{}", out.value.code);
        }
        Command::Edit { project_id, screen_id, code_file, prompt } => {
            let old_code = fs::read_to_string(&code_file).with_context(|| format!("reading {}", code_file))?;
            let input = EditScreenInput { project_id, screen_id, old_code, user_input: prompt };
            let out = pipeline.edit_screen_markup(&input).await?;
            ux::show_screen(&out);
            println!("{}", out.value.code);
        }
    }

    Ok(())
}
