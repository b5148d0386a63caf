//! Capability Shim Library
//!
//! Generated code is told it may use a fixed set of UI and chart components
//! by bare name. None of them exist in the execution realm until this library
//! provides them. The same catalogue drives three consumers:
//!
//! - the generation prompt (which names are advertised)
//! - the in-process evaluator (which names are injected as parameters)
//! - the JS shim sources (which names are defined)
//!
//! Renaming or removing an entry is a breaking change for every artifact that
//! was generated against the previous catalogue; bump [`CATALOGUE_VERSION`].

#![warn(clippy::all, rust_2018_idioms)]

/// Version of the advertised component contract
pub const CATALOGUE_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimFamily {
    Ui,
    Chart,
    Icon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimEntry {
    pub name: &'static str,
    pub family: ShimFamily,
}

const fn ui(name: &'static str) -> ShimEntry {
    ShimEntry {
        name,
        family: ShimFamily::Ui,
    }
}

const fn chart(name: &'static str) -> ShimEntry {
    ShimEntry {
        name,
        family: ShimFamily::Chart,
    }
}

const fn icon(name: &'static str) -> ShimEntry {
    ShimEntry {
        name,
        family: ShimFamily::Icon,
    }
}

pub const CATALOGUE: &[ShimEntry] = &[
    ui("Card"),
    ui("CardHeader"),
    ui("CardTitle"),
    ui("CardDescription"),
    ui("CardContent"),
    ui("CardFooter"),
    ui("Button"),
    ui("Input"),
    ui("Textarea"),
    ui("Label"),
    ui("Badge"),
    ui("Select"),
    ui("SelectTrigger"),
    ui("SelectValue"),
    ui("SelectContent"),
    ui("SelectItem"),
    ui("Progress"),
    ui("Separator"),
    ui("Switch"),
    ui("Checkbox"),
    ui("Tabs"),
    ui("TabsList"),
    ui("TabsTrigger"),
    ui("TabsContent"),
    ui("Alert"),
    ui("AlertTitle"),
    ui("AlertDescription"),
    ui("Avatar"),
    ui("AvatarImage"),
    ui("AvatarFallback"),
    ui("Table"),
    ui("TableHeader"),
    ui("TableBody"),
    ui("TableFooter"),
    ui("TableRow"),
    ui("TableHead"),
    ui("TableCell"),
    ui("TableCaption"),
    chart("ResponsiveContainer"),
    chart("LineChart"),
    chart("BarChart"),
    chart("PieChart"),
    chart("AreaChart"),
    chart("Line"),
    chart("Bar"),
    chart("Pie"),
    chart("Area"),
    chart("Cell"),
    chart("XAxis"),
    chart("YAxis"),
    chart("CartesianGrid"),
    chart("Tooltip"),
    chart("Legend"),
    icon("Icons"),
    icon("Activity"),
    icon("AlertCircle"),
    icon("ArrowLeft"),
    icon("ArrowRight"),
    icon("BarChart3"),
    icon("Bell"),
    icon("Calendar"),
    icon("Check"),
    icon("CheckCircle"),
    icon("ChevronDown"),
    icon("ChevronLeft"),
    icon("ChevronRight"),
    icon("ChevronUp"),
    icon("Clock"),
    icon("DollarSign"),
    icon("Download"),
    icon("Edit"),
    icon("Eye"),
    icon("EyeOff"),
    icon("Filter"),
    icon("Heart"),
    icon("Home"),
    icon("Info"),
    icon("Loader2"),
    icon("Mail"),
    icon("Menu"),
    icon("Minus"),
    icon("Plus"),
    icon("RefreshCw"),
    icon("Search"),
    icon("Settings"),
    icon("Star"),
    icon("Trash2"),
    icon("TrendingDown"),
    icon("TrendingUp"),
    icon("Upload"),
    icon("User"),
    icon("Users"),
    icon("X"),
];

/// React surface injected next to the shims. `React` itself comes first.
pub const FRAMEWORK_NAMES: &[&str] = &[
    "React",
    "ReactDOM",
    "document",
    "Fragment",
    "useState",
    "useEffect",
    "useLayoutEffect",
    "useMemo",
    "useCallback",
    "useRef",
    "useReducer",
    "useContext",
    "createContext",
    "useId",
    "forwardRef",
    "memo",
];

/// Headless React used by the in-process evaluator
pub const MINI_REACT_SOURCE: &str = include_str!("mini_react.js");

/// Shim factories; defines `createUiForgeShims(React, Recharts)`
pub const SHIM_SOURCE: &str = concat!(
    include_str!("ui_shims.js"),
    "\n",
    include_str!("chart_shims.js")
);

pub fn names_of(family: ShimFamily) -> impl Iterator<Item = &'static str> {
    CATALOGUE
        .iter()
        .filter(move |entry| entry.family == family)
        .map(|entry| entry.name)
}

pub fn is_catalogued(name: &str) -> bool {
    CATALOGUE.iter().any(|entry| entry.name == name)
}

/// Parameter names for the in-process evaluator, framework first
pub fn injection_names() -> Vec<&'static str> {
    FRAMEWORK_NAMES
        .iter()
        .copied()
        .chain(CATALOGUE.iter().map(|entry| entry.name))
        .collect()
}

/// Component list as advertised to the model
pub fn advertised_components() -> String {
    let ui: Vec<_> = names_of(ShimFamily::Ui).collect();
    let charts: Vec<_> = names_of(ShimFamily::Chart).collect();
    format!(
        "UI components (already in scope, do not import): {}\nChart components (already in scope): {}\nIcons: use Icons.<Name> or a lucide-style name such as Plus or Search",
        ui.join(", "),
        charts.join(", ")
    )
}

/// ES module re-exporting every catalogue name, for bundler projects
pub fn es_module_source() -> String {
    let names: Vec<&str> = CATALOGUE.iter().map(|entry| entry.name).collect();
    format!(
        "import React from 'react';\nimport * as Recharts from 'recharts';\n\n{}\n\nconst shims = createUiForgeShims(React, Recharts);\n\nexport const {{\n  {}\n}} = shims;\n",
        SHIM_SOURCE,
        names.join(",\n  ")
    )
}
