//! Separates configuration flags from subcommand arguments.
//!
//! Configuration flags lead the command line and are handed to
//! `ortho_config`; everything from the first other token is parsed by clap.

use std::ffi::{OsStr, OsString};

/// CLI flags recognised by the configuration loader.
///
/// Keep in sync with the fields of `spray_config::Config` that matter to
/// the CAD helpers.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--freecad-executable",
    "--linear-deflection",
    "--angular-deflection",
    "--cad-timeout-secs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments split into the configuration and command halves. Both keep
/// the program name as their first element.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_arguments(args: &[OsString]) -> ArgumentSplit {
    let Some((program, rest)) = args.split_first() else {
        return ArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut remaining = rest.iter().peekable();
    while let Some(&argument) = remaining.peek() {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                remaining.next();
                if needs_value && let Some(value) = remaining.next() {
                    config_arguments.push(value.clone());
                }
            }
            FlagAction::Stop => break,
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(remaining.cloned());
    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case::inline("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case::separate("--log-filter", FlagAction::Include { needs_value: true })]
    #[case::command("convert", FlagAction::Stop)]
    #[case::unknown_flag("--step", FlagAction::Stop)]
    fn classifies_arguments(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn leading_config_flags_are_split_off() {
        let split = split_arguments(&os(&[
            "spray-cad",
            "--freecad-executable",
            "/opt/FreeCADCmd",
            "--linear-deflection=0.5",
            "convert",
            "in.step",
        ]));
        assert_eq!(
            split.config_arguments,
            os(&[
                "spray-cad",
                "--freecad-executable",
                "/opt/FreeCADCmd",
                "--linear-deflection=0.5",
            ])
        );
        assert_eq!(split.command_arguments, os(&["spray-cad", "convert", "in.step"]));
    }

    #[test]
    fn flags_after_the_subcommand_stay_with_it() {
        let split = split_arguments(&os(&["spray-cad", "probe", "--log-filter", "debug"]));
        assert_eq!(split.config_arguments, os(&["spray-cad"]));
        assert_eq!(
            split.command_arguments,
            os(&["spray-cad", "probe", "--log-filter", "debug"])
        );
    }
}
