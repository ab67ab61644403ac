use serde_json::{json, Map, Value};
use stacks_core::ils::connection::Connection;
use stacks_core::ils::registry::DriverRegistry;

const CHECKED_FUNCTIONS: [&str; 4] = ["Holds", "cancelHolds", "Renewals", "changePassword"];

/// Run the `capabilities` command: print the function checks as JSON.
pub fn run(config_path: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let connection = Connection::new(&config.catalog, &DriverRegistry::with_builtin())?;
    println!("{}", serde_json::to_string_pretty(&report(&connection))?);
    Ok(())
}

/// Driver state plus one entry per checked function; `false` marks an unsupported one.
pub fn report(connection: &Connection) -> Value {
    let mut functions = Map::new();
    for name in CHECKED_FUNCTIONS {
        let value = match connection.check_function(name) {
            Some(descriptor) => json!(descriptor),
            None => Value::Bool(false),
        };
        functions.insert(name.to_string(), value);
    }

    json!({
        "driver": connection.driver_name(),
        "fallback": connection.is_fallback(),
        "offline_mode": connection.offline_mode(),
        "holds_mode": connection.holds_mode(),
        "title_holds_mode": connection.title_holds_mode(),
        "capabilities": connection.capabilities(),
        "functions": functions,
    })
}

#[cfg(test)]
mod tests {
    use stacks_core::config::CatalogConfig;

    use super::*;

    #[test]
    fn noils_reports_everything_unsupported() {
        let connection = Connection::new(&CatalogConfig::default(), &DriverRegistry::with_builtin())
            .unwrap();
        let report = report(&connection);
        assert_eq!(report["driver"], "noils");
        assert_eq!(report["offline_mode"], "ils-offline");
        for name in CHECKED_FUNCTIONS {
            assert_eq!(report["functions"][name], Value::Bool(false), "{name}");
        }
        assert_eq!(report["capabilities"]["place_hold"], false);
        assert_eq!(report["capabilities"]["patron_account"], false);
    }

    #[test]
    fn demo_driver_capabilities_are_listed() {
        let config = CatalogConfig {
            driver: "demo".into(),
            ..Default::default()
        };
        let connection = Connection::new(&config, &DriverRegistry::with_builtin()).unwrap();
        let report = report(&connection);
        assert_eq!(report["capabilities"]["place_hold"], true);
        assert_eq!(report["capabilities"]["renew_items"], true);
        assert_eq!(report["capabilities"]["change_password"], true);
    }

    #[test]
    fn fallback_is_reported() {
        let config = CatalogConfig {
            driver: "voyager".into(),
            load_no_ils_on_failure: true,
            ..Default::default()
        };
        let connection = Connection::new(&config, &DriverRegistry::with_builtin()).unwrap();
        let report = report(&connection);
        assert_eq!(report["driver"], "noils");
        assert_eq!(report["fallback"], true);
    }
}
