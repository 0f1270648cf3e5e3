//! Load the bundled template plugin and activate it.
//!
//! Run with: `cargo run --example load_plugin`

use std::sync::Arc;

use scriptforge_plugin_api::{
    HostContext, InMemoryConfigStore, NonInteractivePrompt, PluginLoader, StaticModuleFetcher,
    TracingReporter, PLUGIN_TEMPLATE,
};
use scriptforge_runtime::{CapabilityTable, Token, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Capability table the host would build from its service registry.
    let mut table = CapabilityTable::new();
    let commands = Token::new("@host/commands:ICommandRegistry");
    table.register_named_token(commands.clone());

    let host = HostContext {
        files: None,
        fetcher: Arc::new(StaticModuleFetcher::new()),
        prompt: Arc::new(NonInteractivePrompt),
        config: Arc::new(InMemoryConfigStore::new()),
        reporter: Arc::new(TracingReporter),
    };

    let loader = PluginLoader::new(table, host);
    let result = loader.load(PLUGIN_TEMPLATE, None).await?;

    println!("loaded plugin `{}`", result.plugin.id);
    println!("  transpiled: {}", result.transpiled);
    println!(
        "  requires: {:?}",
        result
            .plugin
            .requires
            .iter()
            .map(Token::name)
            .collect::<Vec<_>>()
    );

    if result.plugin.auto_start {
        let deps = result
            .plugin
            .requires
            .iter()
            .cloned()
            .map(Value::Token)
            .collect();
        loader
            .interpreter()
            .call(&result.plugin.activate, deps)
            .await?;
        println!("  activated");
    }

    Ok(())
}
