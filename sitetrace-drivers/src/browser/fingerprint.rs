use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Snapshot of user agent, viewport, and locale characteristics for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
}

struct AgentSeed {
    user_agent: &'static str,
    platform: &'static str,
}

const AGENTS: &[AgentSeed] = &[
    AgentSeed {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "Win32",
    },
    AgentSeed {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "MacIntel",
    },
    AgentSeed {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
        platform: "MacIntel",
    },
    AgentSeed {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
        platform: "Linux x86_64",
    },
];

const VIEWPORT_WIDTHS: &[u32] = &[1200, 1366, 1440, 1600];
const VIEWPORT_HEIGHTS: &[u32] = &[700, 800, 900, 1000];

/// Fixed pool of plausible desktop fingerprints.
#[derive(Debug, Clone, Default)]
pub struct UserAgentManager;

impl UserAgentManager {
    pub fn new() -> Self {
        Self
    }

    /// Draw a user agent and an independent viewport from the pool.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> UserAgentProfile {
        let agent = AGENTS.choose(rng).unwrap_or(&AGENTS[0]);
        let width = VIEWPORT_WIDTHS.choose(rng).copied().unwrap_or(1366);
        let height = VIEWPORT_HEIGHTS.choose(rng).copied().unwrap_or(800);
        UserAgentProfile {
            user_agent: agent.user_agent.to_string(),
            viewport: (width, height),
            platform: agent.platform.to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        }
    }

    /// Draw a profile using the thread-local RNG.
    pub fn random_profile(&self) -> UserAgentProfile {
        self.sample(&mut rand::thread_rng())
    }
}
