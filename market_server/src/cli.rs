use std::env;

const HELP: &str = include_str!("./cli-help.txt");

/// Variables that are safe to echo back. Secrets (`MKT_JWT_SECRET`, `MKT_GATEWAY_API_KEY`,
/// `MKT_GATEWAY_WEBHOOK_SECRET`) are deliberately left out.
const PUBLIC_ENVS: [&str; 12] = [
    "RUST_LOG",
    "MKT_HOST",
    "MKT_PORT",
    "MKT_DATABASE_URL",
    "MKT_DB_MAX_CONNECTIONS",
    "MKT_AUTO_MIGRATE",
    "MKT_CURRENCY",
    "MKT_SIGNATURE_HEADER",
    "MKT_EVENT_BUFFER_SIZE",
    "MKT_GATEWAY_API_URL",
    "MKT_GATEWAY_SIGNATURE_TOLERANCE",
    "MKT_GATEWAY_TIMEOUT",
];

/// The server is configured entirely through the environment. Any command line argument prints the help text and the
/// current (non-secret) configuration, and returns `true` so the caller can exit without starting the server.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{HELP}\n");
    println!("{}", describe_environment());
    true
}

fn describe_environment() -> String {
    let mut out = String::from("Current environment values (secrets are not shown):\n");
    for name in PUBLIC_ENVS {
        let value = match env::var_os(name) {
            Some(v) => v.to_string_lossy().into_owned(),
            None => "Not set".to_string(),
        };
        out.push_str(&format!("  {name:<35} {value}\n"));
    }
    out
}
