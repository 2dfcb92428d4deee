//! End-to-end synthesis orchestration.
//!
//! Loads the interface description named by the configuration, filters
//! methods through the include/exclude lists, and runs both synthesis
//! directions. The output is a serializable bundle the CLI writes as JSON;
//! template engines consume the same bundle through `to_context`.

// Internal imports (std, crate)
use std::path::Path;

use crate::client::{ClientCall, ClientSerializer};
use crate::config::Config;
use crate::convert::ConversionSelector;
use crate::error::{Error, Result};
use crate::invocation::FrameworkKind;
use crate::metadata::InterfaceDescriptor;
use crate::server::{BindingPlanSynthesizer, MethodBinding};

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::fs;

/// Both synthesis directions for one interface
#[derive(Clone, Debug, Serialize)]
pub struct GeneratedInterface {
    /// Interface name
    pub interface: String,
    /// Framework whose catalog drove server-side synthesis
    pub framework: FrameworkKind,
    /// Server-direction bindings, one per selected method
    pub bindings: Vec<MethodBinding>,
    /// Client-direction calls, one per selected method
    pub calls: Vec<ClientCall>,
}

impl GeneratedInterface {
    /// Serialize for the external emitter
    pub fn to_context(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Load, filter and synthesize per the configuration
pub async fn generate(config: &Config) -> Result<GeneratedInterface> {
    let iface = InterfaceDescriptor::from_file(&config.interface_path).await?;
    generate_interface(config, &iface)
}

/// Synthesize both directions for an already-loaded interface
pub fn generate_interface(
    config: &Config,
    iface: &InterfaceDescriptor,
) -> Result<GeneratedInterface> {
    let framework: FrameworkKind = config
        .framework
        .parse()
        .map_err(|e: String| Error::config(e))?;
    let catalog = framework.catalog();
    let conversions = ConversionSelector::default();

    let mut selected = iface.clone();
    selected.methods.retain(|m| config.selects(&m.name));
    log::info!(
        "synthesizing {} of {} methods of `{}` for {}",
        selected.methods.len(),
        iface.methods.len(),
        iface.name,
        framework
    );

    let mut synthesizer = BindingPlanSynthesizer::new(&selected, &catalog, &conversions)
        .with_notations(config.source_notation, config.dest_notation);
    if let Some(envelope) = config.envelope.clone() {
        synthesizer = synthesizer.with_envelope(envelope);
    }
    let bindings = synthesizer.synthesize()?;

    let mut serializer =
        ClientSerializer::new(&selected, &conversions).with_notation(config.source_notation);
    if let Some(envelope) = config.envelope.clone() {
        serializer = serializer.with_envelope(envelope);
    }
    let calls = serializer.serialize()?;

    Ok(GeneratedInterface {
        interface: iface.name.clone(),
        framework,
        bindings,
        calls,
    })
}

/// Write the bundle as pretty-printed JSON under the output directory
pub async fn write_output(generated: &GeneratedInterface, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("{}_plans.json", generated.interface.to_lowercase()));
    let content = serde_json::to_string_pretty(generated)?;
    fs::write(&path, content).await?;
    log::info!("wrote {}", path.display());
    Ok(())
}
