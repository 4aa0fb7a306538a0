use url::Url;

use super::Strategy;

/// A known site and the strategy bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteRegistration {
    pub domain: &'static str,
    pub strategy: Strategy,
    /// The site builds its price client-side and needs a rendering fetch.
    pub requires_rendering: bool,
}

/// Site registry. New sites are appended; existing rows never change meaning.
pub const REGISTRY: &[SiteRegistration] = &[
    SiteRegistration {
        domain: "jula.se",
        strategy: Strategy::Jula,
        requires_rendering: false,
    },
    SiteRegistration {
        domain: "willys.se",
        strategy: Strategy::Willys,
        requires_rendering: true,
    },
];

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub fn registration_for_host(host: &str) -> Option<&'static SiteRegistration> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    REGISTRY.iter().find(|site| host_matches(&host, site.domain))
}

pub fn registration_for(url: &str) -> Option<&'static SiteRegistration> {
    let parsed = Url::parse(url.trim()).ok()?;
    registration_for_host(parsed.host_str()?)
}

/// Strategy for `url`. Unknown or unparseable URLs get the generic strategy.
pub fn resolve(url: &str) -> Strategy {
    registration_for(url)
        .map(|site| site.strategy)
        .unwrap_or(Strategy::Generic)
}

pub fn requires_rendering(url: &str) -> bool {
    registration_for(url).is_some_and(|site| site.requires_rendering)
}
