use rand::seq::SliceRandom;
use rand::Rng;

/// Which pool a fetch attempt's user-agent should be drawn from
/// (spec.md §4.3 step 4: "random draw weighted by request class").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Desktop,
    Mobile,
    /// Draw from both pools, desktop-weighted.
    All,
}

/// `All` draws desktop agents this often; the remainder go to mobile.
const ALL_DESKTOP_WEIGHT_PERCENT: u8 = 80;

pub struct UserAgentPool {
    desktop: Vec<String>,
    mobile: Vec<String>,
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            desktop: default_desktop_agents(),
            mobile: default_mobile_agents(),
        }
    }
}

impl UserAgentPool {
    pub fn new(desktop: Vec<String>, mobile: Vec<String>) -> Self {
        Self { desktop, mobile }
    }

    pub fn pick(&self, class: RequestClass) -> &str {
        let mut rng = rand::thread_rng();
        let pool = match class {
            RequestClass::Desktop => &self.desktop,
            RequestClass::Mobile => &self.mobile,
            RequestClass::All => {
                if self.mobile.is_empty() || rng.gen_range(0..100) < ALL_DESKTOP_WEIGHT_PERCENT {
                    &self.desktop
                } else {
                    &self.mobile
                }
            }
        };
        pool.choose(&mut rng)
            .map(|s| s.as_str())
            .unwrap_or(FALLBACK_USER_AGENT)
    }
}

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn default_desktop_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edg/124.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
    ]
}

fn default_mobile_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Mobile/15E148 Safari/604.1".to_string(),
        "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_class_only_picks_desktop_agents() {
        let pool = UserAgentPool::default();
        for _ in 0..20 {
            let ua = pool.pick(RequestClass::Desktop);
            assert!(!ua.contains("Mobile") && !ua.contains("iPhone"));
        }
    }

    #[test]
    fn mobile_class_only_picks_mobile_agents() {
        let pool = UserAgentPool::default();
        for _ in 0..20 {
            let ua = pool.pick(RequestClass::Mobile);
            assert!(ua.contains("Mobile") || ua.contains("iPhone"));
        }
    }

    #[test]
    fn empty_pool_falls_back_to_a_default() {
        let pool = UserAgentPool::new(vec![], vec![]);
        assert_eq!(pool.pick(RequestClass::Desktop), FALLBACK_USER_AGENT);
    }
}
