use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::wire::DeviceType;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "openrouter")]
    OpenRouter,
    #[value(alias = "openai")]
    OpenAI,
}

impl ProviderKind {
    pub fn default_base(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    Mobile,
    Tablet,
    Desktop,
}

impl From<DeviceArg> for DeviceType {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Mobile => DeviceType::Mobile,
            DeviceArg::Tablet => DeviceType::Tablet,
            DeviceArg::Desktop => DeviceType::Desktop,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mockup_gen", version, about = "LLM-backed UI mockup generator")]
pub struct Args {
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub save_transcripts: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the generation endpoints over HTTP.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate a project manifest from a free-text idea.
    Manifest {
        #[arg(long)]
        prompt: String,
        #[arg(long, value_enum, default_value_t = DeviceArg::Mobile)]
        device: DeviceArg,
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        /// Description of an existing screen; switches to add-a-screen mode.
        #[arg(long)]
        old_screen: Option<String>,
    },
    /// Generate markup for one screen.
    Screen {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        screen_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        description: String,
    },
    /// Rewrite existing markup per an instruction.
    Edit {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        screen_id: String,
        #[arg(long)]
        code_file: String,
        #[arg(long)]
        prompt: String,
    },
}
