//! routegen CLI entrypoint
//! Parses command-line arguments and dispatches to the core synthesizer.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use routegen_core::emit::{PlainRenderer, StepRenderer};
use routegen_core::path_template::Notation;
use routegen_core::{Config, GeneratedInterface, InterfaceDescriptor};
use tokio::fs;

#[derive(Parser)]
#[command(name = "routegen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Synthesize binding plans and write them as JSON
    Plan {
        /// Path or URL to the interface description (YAML or JSON)
        ///
        /// Can be a local file path or an HTTP/HTTPS URL
        /// Example: --interface path/to/calc.yaml
        /// Example: --interface https://example.com/calc.json
        #[arg(long)]
        interface: String,
        /// Target framework (e.g., echo, gin)
        #[arg(long, default_value = "echo")]
        framework: String,
        /// Placeholder notation of the input templates (colon or brace)
        #[arg(long, default_value = "colon")]
        source_notation: String,
        /// Placeholder notation of the rendered output routes
        #[arg(long, default_value = "colon")]
        dest_notation: String,
        /// Output directory for synthesized plans
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Methods to exclude from synthesis
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Print synthesized server bindings as plain statements
    Render {
        /// Path or URL to the interface description (YAML or JSON)
        #[arg(long)]
        interface: String,
        /// Target framework (e.g., echo, gin)
        #[arg(long, default_value = "echo")]
        framework: String,
        /// Placeholder notation of the input templates (colon or brace)
        #[arg(long, default_value = "colon")]
        source_notation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Plan {
            interface,
            framework,
            source_notation,
            dest_notation,
            output_dir,
            exclude,
        } => {
            let iface = load_interface(interface).await?;

            let mut config = Config::new(interface.clone(), String::new());
            config.framework = framework.clone();
            config.source_notation = parse_notation(source_notation)?;
            config.dest_notation = parse_notation(dest_notation)?;
            config.exclude_methods = exclude.clone();

            let generated = routegen_core::generate::generate_interface(&config, &iface)
                .context("Failed to synthesize binding plans")?;

            let output_path = output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(iface.name.to_lowercase()));
            if !output_path.exists() {
                println!("Creating output directory: {}", output_path.display());
                fs::create_dir_all(&output_path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to create output directory: {}", e))?;
            }
            routegen_core::generate::write_output(&generated, &output_path).await?;

            println!(
                "Synthesized {} methods of `{}` into: {}",
                generated.bindings.len(),
                generated.interface,
                output_path.display()
            );
        }
        Commands::Render {
            interface,
            framework,
            source_notation,
        } => {
            let iface = load_interface(interface).await?;

            let mut config = Config::new(interface.clone(), String::new());
            config.framework = framework.clone();
            config.source_notation = parse_notation(source_notation)?;

            let generated = routegen_core::generate::generate_interface(&config, &iface)
                .context("Failed to synthesize binding plans")?;

            print_bindings(&generated);
        }
    }
    Ok(())
}

fn print_bindings(generated: &GeneratedInterface) {
    let renderer = PlainRenderer;
    for binding in &generated.bindings {
        println!("// {} {}  ({})", binding.verb, binding.route, binding.method);
        for plan in &binding.plans {
            for line in renderer.render_plan(plan) {
                println!("{}", line);
            }
        }
        println!();
    }
}

fn parse_notation(s: &str) -> anyhow::Result<Notation> {
    match s.to_lowercase().as_str() {
        "colon" => Ok(Notation::Colon),
        "brace" => Ok(Notation::Brace),
        other => Err(anyhow::anyhow!("Invalid notation '{other}': expected colon or brace")),
    }
}

/// Load the interface description from either a file or URL
async fn load_interface(path: &str) -> anyhow::Result<InterfaceDescriptor> {
    if path.starts_with("http://") || path.starts_with("https://") {
        let response = reqwest::get(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch interface description from {}: {}", path, e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch interface description from {}: HTTP {}",
                path,
                response.status()
            ));
        }

        let content = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response from {}: {}", path, e))?;

        // InterfaceDescriptor::from_file expects a file path, so stage the
        // fetched content through a temporary file.
        let temp_dir = tempfile::tempdir()?;
        let temp_file = temp_dir.path().join("interface.json");
        tokio::fs::write(&temp_file, &content).await?;

        InterfaceDescriptor::from_file(&temp_file)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse interface description from {}: {}", path, e))
    } else {
        InterfaceDescriptor::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load interface description: {}", e))
    }
}
