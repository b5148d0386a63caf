//! Static module resolution table
//!
//! Known packages map to a pinned UMD bundle on a public CDN plus the global
//! the bundle defines. React and ReactDOM are builtin: every strategy already
//! provides them, so they resolve without a fetch. Shim modules (the fabricated
//! UI library and icon set) resolve locally. Everything else fails closed.

#![warn(clippy::all, rust_2018_idioms)]

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: &'static str,
    pub url: &'static str,
    /// Global the UMD bundle assigns
    pub global: &'static str,
    /// Provided by every strategy; never fetched
    pub builtin: bool,
}

const fn cdn(name: &'static str, url: &'static str, global: &'static str) -> ModuleSpec {
    ModuleSpec {
        name,
        url,
        global,
        builtin: false,
    }
}

const fn builtin(name: &'static str, url: &'static str, global: &'static str) -> ModuleSpec {
    ModuleSpec {
        name,
        url,
        global,
        builtin: true,
    }
}

pub const REACT_URL: &str = "https://unpkg.com/react@18.2.0/umd/react.production.min.js";
pub const REACT_DOM_URL: &str = "https://unpkg.com/react-dom@18.2.0/umd/react-dom.production.min.js";
pub const BABEL_URL: &str = "https://unpkg.com/@babel/standalone@7.23.5/babel.min.js";
pub const RECHARTS_URL: &str = "https://unpkg.com/recharts@2.12.7/umd/Recharts.js";
pub const PROP_TYPES_URL: &str = "https://unpkg.com/prop-types@15.8.1/prop-types.min.js";

pub const CDN_TABLE: &[ModuleSpec] = &[
    builtin("react", REACT_URL, "React"),
    builtin("react-dom", REACT_DOM_URL, "ReactDOM"),
    builtin("react-dom/client", REACT_DOM_URL, "ReactDOM"),
    cdn("prop-types", PROP_TYPES_URL, "PropTypes"),
    cdn("recharts", RECHARTS_URL, "Recharts"),
    cdn(
        "chart.js",
        "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js",
        "Chart",
    ),
    cdn("d3", "https://cdn.jsdelivr.net/npm/d3@7.8.5/dist/d3.min.js", "d3"),
    cdn(
        "lodash",
        "https://cdn.jsdelivr.net/npm/lodash@4.17.21/lodash.min.js",
        "_",
    ),
    cdn(
        "date-fns",
        "https://cdn.jsdelivr.net/npm/date-fns@2.30.0/cdn.min.js",
        "dateFns",
    ),
    cdn(
        "axios",
        "https://cdn.jsdelivr.net/npm/axios@1.6.0/dist/axios.min.js",
        "axios",
    ),
    cdn(
        "clsx",
        "https://cdn.jsdelivr.net/npm/clsx@2.0.0/dist/clsx.min.js",
        "clsx",
    ),
    cdn(
        "framer-motion",
        "https://unpkg.com/framer-motion@10.16.4/dist/framer-motion.js",
        "Motion",
    ),
];

/// Modules whose failure is logged but never shown to the user
const OPTIONAL_MODULES: &[&str] = &[
    "recharts",
    "chart.js",
    "react-chartjs-2",
    "d3",
    "victory",
    "framer-motion",
];

/// Module specifiers served by the shim library
const SHIM_MODULES: &[&str] = &[
    "lucide-react",
    "@/components/ui/card",
    "@/components/ui/button",
    "@/components/ui/input",
    "@/components/ui/textarea",
    "@/components/ui/label",
    "@/components/ui/badge",
    "@/components/ui/select",
    "@/components/ui/progress",
    "@/components/ui/separator",
    "@/components/ui/switch",
    "@/components/ui/checkbox",
    "@/components/ui/tabs",
    "@/components/ui/alert",
    "@/components/ui/avatar",
    "@/components/ui/table",
];

/// How a module name resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Builtin(&'static ModuleSpec),
    Cdn(&'static ModuleSpec),
    Shim,
    /// Not in the table; resolved through the local path, which fails closed
    Local,
}

pub fn lookup(name: &str) -> Option<&'static ModuleSpec> {
    CDN_TABLE.iter().find(|spec| spec.name == name)
}

pub fn resolve(name: &str) -> Resolution {
    if let Some(spec) = lookup(name) {
        return if spec.builtin {
            Resolution::Builtin(spec)
        } else {
            Resolution::Cdn(spec)
        };
    }
    if is_shim_module(name) {
        return Resolution::Shim;
    }
    Resolution::Local
}

pub fn is_optional(name: &str) -> bool {
    OPTIONAL_MODULES.contains(&name) || name.starts_with("@nivo/") || name.contains("chart")
}

fn is_shim_module(name: &str) -> bool {
    let name = name.trim_end_matches(".js").trim_end_matches(".jsx").trim_end_matches(".tsx");
    if SHIM_MODULES.contains(&name) {
        return true;
    }
    // Relative spellings of the shim paths: ./components/ui/card, ../ui/card
    if name.starts_with("./") || name.starts_with("../") {
        let tail = name.trim_start_matches("../").trim_start_matches("./");
        return SHIM_MODULES
            .iter()
            .filter_map(|m| m.strip_prefix("@/"))
            .any(|m| m == tail || m.ends_with(&format!("/{}", tail)));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_react_is_builtin() {
        assert!(matches!(resolve("react"), Resolution::Builtin(spec) if spec.global == "React"));
        assert!(matches!(resolve("react-dom/client"), Resolution::Builtin(_)));
    }

    #[test]
    fn test_known_package_resolves_to_cdn() {
        match resolve("recharts") {
            Resolution::Cdn(spec) => {
                assert_eq!(spec.global, "Recharts");
                assert!(spec.url.starts_with("https://"));
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_shim_paths_resolve_locally() {
        assert_eq!(resolve("@/components/ui/card"), Resolution::Shim);
        assert_eq!(resolve("./components/ui/button"), Resolution::Shim);
        assert_eq!(resolve("../ui/tabs"), Resolution::Shim);
        assert_eq!(resolve("lucide-react"), Resolution::Shim);
    }

    #[test]
    fn test_unknown_names_fall_to_local() {
        assert_eq!(resolve("left-pad"), Resolution::Local);
        assert_eq!(resolve("./utils/helpers"), Resolution::Local);
    }

    #[test]
    fn test_optional_allow_list() {
        assert!(is_optional("recharts"));
        assert!(is_optional("react-chartjs-2"));
        assert!(is_optional("@nivo/line"));
        assert!(!is_optional("lodash"));
    }

    #[test]
    fn test_table_urls_are_valid() {
        for spec in CDN_TABLE {
            let parsed = url::Url::parse(spec.url).expect("table URL must parse");
            assert_eq!(parsed.scheme(), "https", "{} is not https", spec.name);
        }
    }
}
