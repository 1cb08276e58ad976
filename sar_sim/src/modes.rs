//! Run modes selectable from the command line.

/// What the CLI should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One agent-based run on a connected ER network
    Agent,

    /// One mean-field integration on a Poisson degree distribution
    MeanField,

    /// Agent-based run and mean field for the same parameters
    Compare,

    /// Agent-based α × λ sweep written to CSV
    Sweep,

    /// Mean-field α × λ sweep written to CSV
    MeanFieldSweep,
}

impl RunMode {
    /// Returns every mode.
    pub fn all() -> Vec<RunMode> {
        vec![
            RunMode::Agent,
            RunMode::MeanField,
            RunMode::Compare,
            RunMode::Sweep,
            RunMode::MeanFieldSweep,
        ]
    }

    /// Returns the mode name.
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Agent => "agent",
            RunMode::MeanField => "mean-field",
            RunMode::Compare => "compare",
            RunMode::Sweep => "sweep",
            RunMode::MeanFieldSweep => "mean-field-sweep",
        }
    }

    /// Returns a description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            RunMode::Agent => "Single agent-based run, series aa/ab/a/r",
            RunMode::MeanField => "EBCM integration with RK4, active fraction a(t)",
            RunMode::Compare => "Agent-based run next to the mean field for the same parameters",
            RunMode::Sweep => "Agent-based sweep over the alpha x lambda grid, CSV output",
            RunMode::MeanFieldSweep => "Mean-field sweep over the alpha x lambda grid, CSV output",
        }
    }

    /// True if the mode writes CSV tables.
    pub fn is_sweep(&self) -> bool {
        matches!(self, RunMode::Sweep | RunMode::MeanFieldSweep)
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "agent" | "abm" => Ok(RunMode::Agent),
            "mean-field" | "ebcm" => Ok(RunMode::MeanField),
            "compare" => Ok(RunMode::Compare),
            "sweep" => Ok(RunMode::Sweep),
            "mean-field-sweep" => Ok(RunMode::MeanFieldSweep),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for mode in RunMode::all() {
            assert_eq!(mode.name().parse::<RunMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_parse_aliases_and_errors() {
        assert_eq!("MEAN_FIELD".parse::<RunMode>(), Ok(RunMode::MeanField));
        assert_eq!("ebcm".parse::<RunMode>(), Ok(RunMode::MeanField));
        assert!("chaos".parse::<RunMode>().is_err());
    }
}
