//! Icinga2 `CheckCommand` generation from the clap definition of the plugin.

use clap::ArgAction;

pub struct CommandDescription {
    arguments: Vec<ArgumentDescription>,
}

pub struct ArgumentDescription {
    name: String,
    var: String,
    description: Option<String>,
    is_flag: bool,
    required: bool,
    default_value: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ToIcingaCommandError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid executable path")]
    InvalidExecutablePath,
    #[error("error converting to command description: {0}")]
    CommandDescriptionFromError(#[from] CommandDescriptionFromError),
}

#[derive(Debug, thiserror::Error)]
pub enum CommandDescriptionFromError {
    #[error("argument `{0}` has no long name")]
    MissingLongArgument(String),
}

impl CommandDescription {
    /// Reads every long argument of `cmd`. Custom vars are named `<var_prefix>_<argument>`.
    pub fn from_command(
        cmd: &clap::Command,
        var_prefix: &str,
    ) -> Result<Self, CommandDescriptionFromError> {
        let mut arguments = Vec::new();

        for arg in cmd.get_arguments() {
            if matches!(
                arg.get_action(),
                ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
            ) {
                continue;
            }

            let long = arg.get_long().ok_or_else(|| {
                CommandDescriptionFromError::MissingLongArgument(arg.get_id().to_string())
            })?;

            let is_flag = !arg.get_action().takes_values();
            let choices: Vec<String> = if is_flag {
                Vec::new()
            } else {
                arg.get_possible_values()
                    .iter()
                    .map(|v| v.get_name().to_owned())
                    .collect()
            };

            let description = arg.get_help().map(|help| {
                if choices.is_empty() {
                    help.to_string()
                } else {
                    format!("{} (one of: {})", help, choices.join(", "))
                }
            });

            // values coming from the environment are not required on the command line
            let required = arg.is_required_set() && arg.get_env().is_none();

            let default_value = arg
                .get_default_values()
                .first()
                .and_then(|v| v.to_str())
                .map(|s| s.to_string());

            arguments.push(ArgumentDescription {
                name: format!("--{}", long),
                var: format!("{}_{}", var_prefix, long.replace('-', "_")),
                description,
                is_flag,
                required,
                default_value,
            });
        }

        Ok(CommandDescription { arguments })
    }

    pub fn to_icinga_command(&self, name: &str) -> Result<String, ToIcingaCommandError> {
        let current_exe = std::env::current_exe()?
            .to_str()
            .ok_or(ToIcingaCommandError::InvalidExecutablePath)?
            .to_owned();

        Ok(self.render(name, &current_exe))
    }

    fn render(&self, name: &str, executable: &str) -> String {
        let mut out = format!("object CheckCommand \"{name}\" {{\n");

        out.push_str(&format!("  command = [ \"{executable}\" ]\n"));
        out.push_str("  arguments = {\n");
        for arg in &self.arguments {
            out.push_str(&format!("    \"{}\" = {{\n", arg.name));

            if arg.is_flag {
                out.push_str(&format!("      set_if = \"${}$\"\n", arg.var));
            } else {
                out.push_str(&format!("      value = \"${}$\"\n", arg.var));
            }

            if arg.required {
                out.push_str("      required = true\n");
            }

            if let Some(description) = &arg.description {
                out.push_str(&format!(
                    "      description = \"{}\"\n",
                    escape_string(description)
                ));
            }

            out.push_str("    }\n");
        }
        out.push_str("  }\n");

        let defaults: Vec<_> = self
            .arguments
            .iter()
            .filter_map(|arg| arg.default_value.as_ref().map(|value| (&arg.var, value)))
            .collect();
        if !defaults.is_empty() {
            out.push('\n');
            for (var, value) in defaults {
                out.push_str(&format!("  vars.{} = \"{}\"\n", var, escape_string(value)));
            }
        }

        out.push_str("}\n");
        out
    }
}

fn escape_string(s: &str) -> String {
    ["\"", "$"]
        .iter()
        .fold(s.to_string(), |acc, c| acc.replace(c, &format!("\\{}", c)))
}

/// Print the Icinga command configuration if the GENERATE_ICINGA_COMMAND environment variable is set
/// and exit the process.
pub fn print_icinga_command_config_if_env_and_exit(
    name: &str,
    cmd: &clap::Command,
) -> Result<(), ToIcingaCommandError> {
    if std::env::var_os("GENERATE_ICINGA_COMMAND").is_none() {
        return Ok(());
    }

    let description = CommandDescription::from_command(cmd, name)?;
    let out = description.to_icinga_command(name)?;

    println!("{}", out.trim());
    std::process::exit(0);
}
