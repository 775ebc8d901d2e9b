use crate::config::Config;
use crate::errors::WebsearchError;
use crate::terminal::TerminalManager;
use crate::tools::ToolRegistry;
use crate::tools::base::Adapter;
use crate::tools::system::SystemOpener;
use crate::tools::{finance, free_apis, productivity, system, terminal, weather, web};
use crate::utils::expand_home;
use std::sync::Arc;
use tracing::{info, warn};

/// Adapters enabled by `config`, in registration order.
pub fn enabled_adapters(config: &Config) -> Vec<Adapter> {
    let tools = &config.tools;
    let mut adapters = Vec::new();

    if tools.web.enabled {
        adapters.push(web::adapter(&tools.web));
    }
    if tools.weather.enabled {
        adapters.push(weather::adapter(&tools.weather));
    }
    if tools.finance.enabled {
        adapters.push(finance::adapter());
    }
    if tools.free_apis.enabled {
        adapters.push(free_apis::adapter());
    }
    if tools.productivity.enabled {
        adapters.push(productivity::adapter());
    }
    if tools.system.enabled {
        adapters.push(system::adapter(Arc::new(SystemOpener)));
    }
    if tools.terminal.enabled {
        let cwd = tools.terminal.working_dir.as_deref().map(expand_home);
        let manager = TerminalManager::new(tools.terminal.shell.clone(), cwd);
        adapters.push(terminal::adapter(manager, tools.terminal.default_timeout));
    }
    adapters
}

/// Build the registry for `config`.
///
/// With `registry.rejectDuplicates` set, a colliding adapter aborts startup.
/// Otherwise collisions overwrite earlier bindings.
pub fn build_registry(config: &Config) -> Result<ToolRegistry, WebsearchError> {
    build_registry_from(config, enabled_adapters(config))
}

pub(crate) fn build_registry_from(
    config: &Config,
    adapters: Vec<Adapter>,
) -> Result<ToolRegistry, WebsearchError> {
    let mut registry = ToolRegistry::with_max_result_chars(config.registry.max_result_chars);

    for adapter in adapters {
        let name = adapter.name.clone();
        if config.registry.reject_duplicates {
            registry
                .register_strict(adapter)
                .map_err(|e| WebsearchError::Config(e.to_string()))?;
        } else {
            let overwritten = registry.register(adapter);
            if !overwritten.is_empty() {
                warn!(
                    "adapter '{}' replaced existing tools: {}",
                    name,
                    overwritten.join(", ")
                );
            }
        }
    }

    info!(
        "registered {} tools from {} adapters",
        registry.len(),
        registry.get_all_adapters().len()
    );
    Ok(registry)
}
