use sitetrace_common::StealthLevel;

use super::fingerprint::UserAgentProfile;

/// Construct Chrome command-line arguments for a stealth level and fingerprint.
pub fn build_stealth_arguments(level: StealthLevel, profile: &UserAgentProfile) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--incognito".to_string(),
        "--disable-extensions".to_string(),
        "--disable-plugins-discovery".to_string(),
        format!("--user-agent={}", profile.user_agent),
        format!("--window-size={},{}", profile.viewport.0, profile.viewport.1),
        format!("--lang={}", profile.languages.join(",")),
    ];
    if level == StealthLevel::Maximum {
        args.push("--disable-features=IsolateOrigins,site-per-process".to_string());
    }
    args
}

/// JavaScript evasions installed before any page script runs.
///
/// Every fragment is wrapped in its own function scope because init scripts
/// share the page's global scope and run again on every navigation.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions(profile: &UserAgentProfile) -> String {
        let languages = serde_json::to_string(&profile.languages)
            .unwrap_or_else(|_| r#"["en-US","en"]"#.to_string());
        format!(
            r#"
            (() => {{
                Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
                Object.defineProperty(navigator, 'plugins', {{ get: () => [1, 2, 3, 4, 5] }});
                Object.defineProperty(navigator, 'languages', {{ get: () => {languages} }});
                if (!window.chrome) window.chrome = {{ runtime: {{}} }};
            }})();
            "#
        )
    }

    pub fn webgl_evasions() -> &'static str {
        r#"
            (() => {
                if (typeof WebGLRenderingContext === 'undefined') return;
                const getParameter = WebGLRenderingContext.prototype.getParameter;
                WebGLRenderingContext.prototype.getParameter = function(parameter) {
                    if (parameter === 37445) return 'Intel Inc.';
                    if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                    return getParameter.call(this, parameter);
                };
            })();
        "#
    }

    pub fn canvas_evasions() -> &'static str {
        r#"
            (() => {
                const getContext = HTMLCanvasElement.prototype.getContext;
                HTMLCanvasElement.prototype.getContext = function(type, ...args) {
                    const ctx = getContext.call(this, type, ...args);
                    if (type === '2d' && ctx) {
                        const origToDataURL = this.toDataURL;
                        this.toDataURL = function(...a) {
                            const imgdata = ctx.getImageData(0, 0, this.width, this.height);
                            for (let i = 0; i < imgdata.data.length; i += 4) {
                                if (Math.random() < 0.001) imgdata.data[i] += Math.random() < 0.5 ? -1 : 1;
                            }
                            ctx.putImageData(imgdata, 0, 0);
                            return origToDataURL.call(this, ...a);
                        };
                    }
                    return ctx;
                };
            })();
        "#
    }

    pub fn platform_override(profile: &UserAgentProfile) -> String {
        let platform =
            serde_json::to_string(&profile.platform).unwrap_or_else(|_| "\"Win32\"".to_string());
        format!(
            "(() => {{ Object.defineProperty(navigator, 'platform', {{ get: () => {platform} }}); }})();"
        )
    }

    /// The complete evasion script for `level`, fragments in install order.
    pub fn for_level(level: StealthLevel, profile: &UserAgentProfile) -> String {
        let mut parts = vec![Self::core_evasions(profile)];
        match level {
            StealthLevel::Lightweight => {}
            StealthLevel::Balanced => {
                parts.push(Self::canvas_evasions().to_string());
            }
            StealthLevel::Maximum => {
                parts.push(Self::canvas_evasions().to_string());
                parts.push(Self::webgl_evasions().to_string());
                parts.push(Self::platform_override(profile));
            }
        }
        parts.join("\n")
    }
}
