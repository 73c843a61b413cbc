//! User-Friendly Error Formatting
//!
//! Turns an `anyhow` chain from startup or the command loop into a message
//! with hints for the usual mistakes.

use std::fmt::Write;

use crate::display::{DisplayError, SpecParseError};

/// Format error for user consumption
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Typed causes first, then fall back to the message text
    let spec_error = error.chain().find_map(|cause| {
        cause
            .downcast_ref::<SpecParseError>()
            .or_else(|| match cause.downcast_ref::<DisplayError>() {
                Some(DisplayError::Spec(inner)) => Some(inner),
                _ => None,
            })
    });
    let display_error = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<DisplayError>());
    let error_msg = error.to_string();

    if let Some(spec_error) = spec_error {
        format_spec_error(&mut output, spec_error);
    } else if let Some(display_error) = display_error {
        format_display_error(&mut output, display_error);
    } else if error_msg.contains("config") || error_msg.contains("Layout") {
        format_config_error(&mut output, &error_msg);
    } else {
        format_generic_error(&mut output, &error_msg);
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-display-topology -vvv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Print the effective configuration: lamco-display-topology --dump-config"
    )
    .ok();

    output
}

fn format_spec_error(output: &mut String, error: &SpecParseError) {
    writeln!(output, "Display Spec Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not parse a display description: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Expected format, one display per comma-separated entry:").ok();
    writeln!(output).ok();
    writeln!(output, "  [x+y-]WxH[*dsf][#WxH[%hz]|...][/orul][@ui_scale]").ok();
    writeln!(output).ok();
    writeln!(output, "Examples:").ok();
    writeln!(output, "  1920x1080                 one display at the origin").ok();
    writeln!(output, "  1920x1080*2               scale factor 2").ok();
    writeln!(output, "  1366x768,0+868-1280x1024  two displays").ok();
    writeln!(output, "  1280x800/r                rotated 90 degrees").ok();
    match error {
        SpecParseError::UnknownOption(_) => {
            writeln!(output).ok();
            writeln!(
                output,
                "  Options after '/' are o (overscan), r, u and l (rotation)"
            )
            .ok();
        }
        SpecParseError::InvalidScale(_) => {
            writeln!(output).ok();
            writeln!(output, "  Scales must be positive numbers, like 1.25").ok();
        }
        _ => {}
    }
}

fn format_display_error(output: &mut String, error: &DisplayError) {
    writeln!(output, "Display Request Rejected").ok();
    writeln!(output).ok();
    writeln!(output, "{}", error).ok();
    writeln!(output).ok();
    match error {
        DisplayError::UnsupportedMode { .. } => {
            writeln!(output, "  → Only modes advertised by the display can be selected").ok();
            writeln!(output, "  → Run 'show' to list the active displays").ok();
        }
        DisplayError::DisplayNotFound(_) | DisplayError::DisplayNotActive(_) => {
            writeln!(output, "  → Check the id with 'show'").ok();
            writeln!(output, "  → Disconnected displays keep their settings but cannot be configured live").ok();
        }
        DisplayError::InvalidLayout(_) => {
            writeln!(output, "  → A layout must name every active display exactly once").ok();
            writeln!(output, "  → Each placement must attach to a display already placed").ok();
        }
        DisplayError::ReentrantUpdate => {
            writeln!(output, "  → An observer tried to reconfigure displays while being notified").ok();
        }
        DisplayError::Spec(_) => {}
    }
}

fn format_config_error(output: &mut String, _error: &str) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Specify: lamco-display-topology -c /path/to/display.toml"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Inconsistent [[layouts]] entry").ok();
    writeln!(output, "     → At least two distinct ids, primary among them").ok();
    writeln!(output, "     → Placements may only refer to the listed ids").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Display Engine Error").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Re-run with -vv to see every reconciliation pass").ok();
    writeln!(output, "  2. Start from defaults by omitting --config").ok();
}
