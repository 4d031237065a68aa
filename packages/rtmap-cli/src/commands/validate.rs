use crate::cli::ValidateArgs;
use crate::commands;
use crate::exit_codes;
use crate::output;
use rtmap::RtMapConfig;
use serde::Serialize;

#[derive(Serialize)]
struct ValidateOutput {
    file: String,
    valid: bool,
    config: Option<RtMapConfig>,
    error: Option<String>,
}

pub fn execute(args: ValidateArgs) -> i32 {
    let (config, code, error) = match commands::load_config(&args.conf) {
        Ok(config) => (Some(config), exit_codes::SUCCESS, None),
        Err(e) => (None, commands::exit_code_for(&e), Some(e.to_string())),
    };

    if args.json {
        let result = ValidateOutput {
            file: args.conf.clone(),
            valid: error.is_none(),
            config: config.clone(),
            error: error.clone(),
        };
        match output::to_json(&result, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else if let Some(ref err) = error {
        eprintln!("Error: {}", err);
    } else if let Some(ref config) = config {
        println!(
            "Config '{}' is valid ({} channels, {} threads, {} max active reads, {} max chunks)",
            args.conf,
            config.global.num_channels,
            config.global.threads,
            config.pool.max_active_reads,
            config.pool.max_chunks
        );
    }

    code
}
