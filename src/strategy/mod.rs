//! Rendering strategies, ordered by capability.

pub mod machine;
mod transform;

pub use transform::{to_basic, to_plaintext, to_simplified, transform_for};

use crate::analyzer::{Complexity, ContentAnalysis, RenderingStrategy};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rendering capability level.
///
/// Variants are declared weakest first, so the derived ordering gives
/// `Full > Simplified > Basic > Plaintext > ErrorFallback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Terminal state: the raw content is echoed verbatim.
    ErrorFallback,
    Plaintext,
    Basic,
    Simplified,
    Full,
}

impl Strategy {
    /// The levels a render backend can serve, strongest first.
    pub const LEVELS: [Strategy; 4] = [
        Strategy::Full,
        Strategy::Simplified,
        Strategy::Basic,
        Strategy::Plaintext,
    ];

    /// The next weaker level, if any.
    pub fn degrade(self) -> Option<Strategy> {
        match self {
            Strategy::Full => Some(Strategy::Simplified),
            Strategy::Simplified => Some(Strategy::Basic),
            Strategy::Basic => Some(Strategy::Plaintext),
            Strategy::Plaintext | Strategy::ErrorFallback => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Strategy::ErrorFallback
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Full => "full",
            Strategy::Simplified => "simplified",
            Strategy::Basic => "basic",
            Strategy::Plaintext => "plaintext",
            Strategy::ErrorFallback => "error-fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-selected rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Pick the initial strategy from the content analysis.
    #[default]
    Auto,
    Full,
    Safe,
    MathOptimized,
    Plaintext,
}

impl FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(RenderMode::Auto),
            "full" => Ok(RenderMode::Full),
            "safe" => Ok(RenderMode::Safe),
            "math-optimized" | "math_optimized" => Ok(RenderMode::MathOptimized),
            "plaintext" => Ok(RenderMode::Plaintext),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Choose the first strategy to attempt.
///
/// An explicit mode wins; `Auto` follows the analyzer's suggestion and
/// defaults to `Full` when no analysis is available.
pub fn initial_strategy(mode: RenderMode, analysis: Option<&ContentAnalysis>) -> Strategy {
    match mode {
        RenderMode::Full | RenderMode::MathOptimized => Strategy::Full,
        RenderMode::Safe => Strategy::Basic,
        RenderMode::Plaintext => Strategy::Plaintext,
        RenderMode::Auto => match analysis {
            None => Strategy::Full,
            Some(analysis) => match analysis.rendering_strategy {
                RenderingStrategy::MathOptimized => Strategy::Full,
                RenderingStrategy::Progressive => match analysis.complexity {
                    Complexity::Complex | Complexity::Moderate => Strategy::Simplified,
                    Complexity::Simple | Complexity::None => Strategy::Basic,
                },
                RenderingStrategy::PlaintextSafe => Strategy::Basic,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;

    #[test]
    fn test_ordering() {
        assert!(Strategy::Full > Strategy::Simplified);
        assert!(Strategy::Simplified > Strategy::Basic);
        assert!(Strategy::Basic > Strategy::Plaintext);
        assert!(Strategy::Plaintext > Strategy::ErrorFallback);
    }

    #[test]
    fn test_degrade_chain() {
        let mut chain = vec![Strategy::Full];
        while let Some(next) = chain.last().and_then(|s| s.degrade()) {
            chain.push(next);
        }
        assert_eq!(chain, Strategy::LEVELS.to_vec());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("math-optimized".parse::<RenderMode>(), Ok(RenderMode::MathOptimized));
        assert_eq!(" SAFE ".parse::<RenderMode>(), Ok(RenderMode::Safe));
        assert_eq!(
            "fancy".parse::<RenderMode>(),
            Err(ConfigError::UnknownMode("fancy".to_string()))
        );
    }

    #[test]
    fn test_explicit_mode_wins() {
        let analysis = analyze("plain words");
        assert_eq!(initial_strategy(RenderMode::Full, Some(&analysis)), Strategy::Full);
        assert_eq!(initial_strategy(RenderMode::Plaintext, None), Strategy::Plaintext);
        assert_eq!(initial_strategy(RenderMode::Safe, None), Strategy::Basic);
    }

    #[test]
    fn test_auto_mode_follows_analysis() {
        assert_eq!(initial_strategy(RenderMode::Auto, None), Strategy::Full);

        let dense = analyze(concat!(
            r"$$\sum_{i=1}^n \frac{\alpha_i}{\beta_i} \leq ",
            r"\int_0^\infty \sqrt{\gamma} \cdot \pi \, \delta \, d\theta$$"
        ));
        assert_eq!(initial_strategy(RenderMode::Auto, Some(&dense)), Strategy::Full);

        let moderate = analyze("# A\n## B\n- x\n- y\n- z\n**w**");
        assert_eq!(initial_strategy(RenderMode::Auto, Some(&moderate)), Strategy::Simplified);

        let light = analyze("just $x$");
        assert_eq!(initial_strategy(RenderMode::Auto, Some(&light)), Strategy::Basic);
    }
}
