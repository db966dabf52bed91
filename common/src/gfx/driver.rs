use std::fmt;

use crate::config::CommandLine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverKind {
    Hardware,
    Warp,
    Reference,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverKind::Hardware => "hardware",
            DriverKind::Warp => "WARP",
            DriverKind::Reference => "reference",
        })
    }
}

/// Order in which device creation is attempted.
pub fn driver_candidates(command_line: &CommandLine) -> Vec<DriverKind> {
    let mut candidates = vec![DriverKind::Hardware, DriverKind::Warp, DriverKind::Reference];

    if command_line.use_reference_device {
        candidates.retain(|d| *d != DriverKind::Reference);
        candidates.insert(0, DriverKind::Reference);
    }
    if command_line.use_warp_device {
        candidates.retain(|d| *d != DriverKind::Warp);
        candidates.insert(0, DriverKind::Warp);
    }

    candidates
}

/// Tries `create` for each candidate and returns the first success.
/// When all fail the last error is returned; an empty list yields `None`.
pub fn create_with_fallback<T, E, F>(
    candidates: &[DriverKind],
    mut create: F,
) -> Option<Result<(DriverKind, T), E>>
where
    E: fmt::Display,
    F: FnMut(DriverKind) -> Result<T, E>,
{
    let mut last_error = None;

    for &driver in candidates {
        match create(driver) {
            Ok(value) => return Some(Ok((driver, value))),
            Err(e) => {
                log::warn!("{driver} device creation failed: {e}");
                last_error = Some(e);
            }
        }
    }

    last_error.map(Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_prefers_hardware() {
        assert_eq!(
            driver_candidates(&CommandLine::default()),
            vec![DriverKind::Hardware, DriverKind::Warp, DriverKind::Reference]
        );
    }

    #[test]
    fn warp_switch_moves_warp_first() {
        let command_line = CommandLine {
            use_warp_device: true,
            ..Default::default()
        };
        assert_eq!(
            driver_candidates(&command_line),
            vec![DriverKind::Warp, DriverKind::Hardware, DriverKind::Reference]
        );
    }

    #[test]
    fn first_success_wins() {
        let mut attempts = Vec::new();
        let result = create_with_fallback(&driver_candidates(&CommandLine::default()), |d| {
            attempts.push(d);
            if d == DriverKind::Warp {
                Ok(11)
            } else {
                Err(format!("{d} unavailable"))
            }
        });
        assert_eq!(result.unwrap().unwrap(), (DriverKind::Warp, 11));
        assert_eq!(attempts, vec![DriverKind::Hardware, DriverKind::Warp]);
    }

    #[test]
    fn all_failures_return_last_error() {
        let result: Option<Result<(DriverKind, ()), String>> = create_with_fallback(
            &[DriverKind::Hardware, DriverKind::Reference],
            |d| Err(format!("{d} failed")),
        );
        assert_eq!(result.unwrap().unwrap_err(), "reference failed");
    }

    #[test]
    fn empty_candidate_list() {
        let result: Option<Result<(DriverKind, ()), String>> =
            create_with_fallback(&[], |_| Ok(()));
        assert!(result.is_none());
    }
}
