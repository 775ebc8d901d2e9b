use super::schema::Config;
use tracing::debug;

macro_rules! define_env_overrides {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// (slot name, env var name) pairs.
        pub const ENV_OVERRIDES: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Get the current value of an overridable field by slot name.
        pub fn get_override_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        /// Apply environment variable overrides.
        ///
        /// Any `WEBSEARCH_*` env var that is set and non-empty overwrites the
        /// corresponding config field, so keys can be injected without touching
        /// the config file.
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env)
                    && !val.is_empty()
                {
                    debug!("config: {} overridden from {}", $name, $env);
                    config.$($path).+ = val;
                }
            )*
        }
    };
}

define_env_overrides! {
    "openweather-api-key", "WEBSEARCH_OPENWEATHER_API_KEY" => tools.weather.openweather_api_key;
    "weatherapi-key",      "WEBSEARCH_WEATHERAPI_KEY"      => tools.weather.weatherapi_key;
    "searxng-url",         "WEBSEARCH_SEARXNG_URL"         => tools.web.searxng_url;
    "terminal-shell",      "WEBSEARCH_SHELL"               => tools.terminal.shell;
}
