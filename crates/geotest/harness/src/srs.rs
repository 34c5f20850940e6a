//! Spatial reference parsing and semantic comparison.
//!
//! Two renderings of the same coordinate system rarely agree textually:
//! authority codes, axis hints, `TOWGS84` clauses and number formatting all
//! vary between writers. [`SpatialReference`] keeps only what defines the
//! system (ellipsoid, datum, prime meridian, units, projection and its
//! parameters) and compares those.

use crate::context::RunContext;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from parsing WKT or user SRS input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SrsError {
    #[error("empty spatial reference")]
    Empty,

    #[error("malformed WKT at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unsupported WKT root node {0}")]
    UnsupportedNode(String),

    #[error("{parent} node is missing {child}")]
    Missing { parent: String, child: &'static str },

    #[error("unrecognized spatial reference input: {0}")]
    UnknownInput(String),
}

pub type SrsResult<T> = Result<T, SrsError>;

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

const NAD83_WKT: &str = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]]"#;

const NAD27_WKT: &str = r#"GEOGCS["NAD27",DATUM["North_American_Datum_1927",SPHEROID["Clarke 1866",6378206.4,294.9786982138982,AUTHORITY["EPSG","7008"]],AUTHORITY["EPSG","6267"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4267"]]"#;

const NAD27_UTM11_WKT: &str = r#"PROJCS["NAD27 / UTM zone 11N",GEOGCS["NAD27",DATUM["North_American_Datum_1927",SPHEROID["Clarke 1866",6378206.4,294.9786982138982,AUTHORITY["EPSG","7008"]],AUTHORITY["EPSG","6267"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4267"]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",-117],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","26711"]]"#;

/// Well-known definitions accepted by [`SpatialReference::from_user_input`].
const WELL_KNOWN: &[(&[&str], &str)] = &[
    (&["EPSG:4326", "WGS84", "WGS 84"], WGS84_WKT),
    (&["EPSG:4269", "NAD83"], NAD83_WKT),
    (&["EPSG:4267", "NAD27"], NAD27_WKT),
    (&["EPSG:26711"], NAD27_UTM11_WKT),
];

/// Relative tolerance for numeric SRS parameters.
const PARAMETER_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// WKT tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum WktValue {
    Text(String),
    Number(f64),
    Node(WktNode),
}

#[derive(Debug, Clone, PartialEq)]
struct WktNode {
    keyword: String,
    values: Vec<WktValue>,
}

impl WktNode {
    fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            values: Vec::new(),
        }
    }

    fn text(mut self, value: &str) -> Self {
        self.values.push(WktValue::Text(value.to_string()));
        self
    }

    fn number(mut self, value: f64) -> Self {
        self.values.push(WktValue::Number(value));
        self
    }

    fn node(mut self, child: WktNode) -> Self {
        self.values.push(WktValue::Node(child));
        self
    }

    fn child<'a>(&'a self, keyword: &'a str) -> Option<&'a WktNode> {
        self.children(keyword).next()
    }

    fn children<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a WktNode> + 'a {
        self.values.iter().filter_map(move |v| match v {
            WktValue::Node(n) if n.keyword.eq_ignore_ascii_case(keyword) => Some(n),
            _ => None,
        })
    }

    fn require(&self, keyword: &'static str) -> SrsResult<&WktNode> {
        self.child(keyword).ok_or_else(|| SrsError::Missing {
            parent: self.keyword.clone(),
            child: keyword,
        })
    }

    fn name(&self) -> String {
        match self.values.first() {
            Some(WktValue::Text(t)) => t.clone(),
            _ => String::new(),
        }
    }

    /// The `n`-th numeric value of the node.
    fn number_at(&self, n: usize, what: &'static str) -> SrsResult<f64> {
        self.values
            .iter()
            .filter_map(|v| match v {
                WktValue::Number(x) => Some(*x),
                _ => None,
            })
            .nth(n)
            .ok_or_else(|| SrsError::Missing {
                parent: self.keyword.clone(),
                child: what,
            })
    }

    fn render(&self, out: &mut String, indent: Option<usize>) {
        out.push_str(&self.keyword);
        out.push('[');
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match value {
                WktValue::Text(t) => {
                    out.push('"');
                    out.push_str(&t.replace('"', "\"\""));
                    out.push('"');
                }
                WktValue::Number(x) => out.push_str(&x.to_string()),
                WktValue::Node(n) => match indent {
                    Some(depth) => {
                        out.push('\n');
                        out.push_str(&"    ".repeat(depth + 1));
                        n.render(out, Some(depth + 1));
                    }
                    None => n.render(out, None),
                },
            }
        }
        out.push(']');
    }
}

struct WktParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> WktParser<'a> {
    fn parse(src: &'a str) -> SrsResult<WktNode> {
        let mut parser = Self { src, pos: 0 };
        let node = parser.node()?;
        parser.skip_ws();
        if parser.pos != src.len() {
            return Err(parser.error("trailing characters after root node"));
        }
        Ok(node)
    }

    fn error(&self, message: &str) -> SrsError {
        SrsError::Parse {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn identifier(&mut self) -> SrsResult<String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected keyword"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn node(&mut self) -> SrsResult<WktNode> {
        let keyword = self.identifier()?;
        self.node_body(keyword)
    }

    fn node_body(&mut self, keyword: String) -> SrsResult<WktNode> {
        let keyword = keyword.to_ascii_uppercase();
        self.skip_ws();
        let close = match self.bump() {
            Some('[') => ']',
            Some('(') => ')',
            _ => return Err(self.error("expected '[' or '('")),
        };

        let mut node = WktNode {
            keyword,
            values: Vec::new(),
        };
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(node);
        }
        loop {
            node.values.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(node),
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
    }

    fn value(&mut self) -> SrsResult<WktValue> {
        self.skip_ws();
        match self.peek() {
            Some('"') => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        // A doubled quote is an escaped quote.
                        Some('"') if self.peek() == Some('"') => {
                            self.bump();
                        }
                        Some('"') => break,
                        Some(_) => {}
                        None => return Err(self.error("unterminated string")),
                    }
                }
                let raw = &self.src[start..self.pos - 1];
                Ok(WktValue::Text(raw.replace("\"\"", "\"")))
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| {
                    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
                }) {
                    self.bump();
                }
                self.src[start..self.pos]
                    .parse::<f64>()
                    .map(WktValue::Number)
                    .map_err(|_| self.error("invalid number"))
            }
            Some(_) => {
                // Bare enumerations such as AXIS["Lat",NORTH] carry no brackets.
                let word = self.identifier()?;
                self.skip_ws();
                if matches!(self.peek(), Some('[') | Some('(')) {
                    self.node_body(word).map(WktValue::Node)
                } else {
                    Ok(WktValue::Text(word))
                }
            }
            None => Err(self.error("unexpected end of input")),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized reference systems
// ---------------------------------------------------------------------------

/// A geographic coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicCrs {
    pub name: String,
    pub datum: String,
    pub spheroid: String,
    pub semi_major: f64,
    pub inverse_flattening: f64,
    pub prime_meridian_name: String,
    pub prime_meridian: f64,
    pub angular_unit_name: String,
    /// Radians per unit.
    pub angular_unit: f64,
}

/// A projected coordinate system on top of a [`GeographicCrs`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedCrs {
    pub name: String,
    pub geographic: GeographicCrs,
    pub projection: String,
    /// Keyed by normalized parameter name.
    pub parameters: BTreeMap<String, f64>,
    pub linear_unit_name: String,
    /// Metres per unit.
    pub linear_unit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialReference {
    Geographic(GeographicCrs),
    Projected(ProjectedCrs),
    /// `LOCAL_CS`: only the name is meaningful.
    Local(String),
}

impl SpatialReference {
    /// Parse a WKT (version 1) definition.
    pub fn from_wkt(wkt: &str) -> SrsResult<Self> {
        if wkt.trim().is_empty() {
            return Err(SrsError::Empty);
        }
        let root = WktParser::parse(wkt)?;
        match root.keyword.as_str() {
            "GEOGCS" => Ok(Self::Geographic(geographic_from(&root)?)),
            "PROJCS" => Ok(Self::Projected(projected_from(&root)?)),
            "LOCAL_CS" => Ok(Self::Local(root.name())),
            other => Err(SrsError::UnsupportedNode(other.to_string())),
        }
    }

    /// Accept WKT, `EPSG:<code>` for the codes in the built-in table, or the
    /// names `WGS84`, `NAD83` and `NAD27`.
    pub fn from_user_input(input: &str) -> SrsResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SrsError::Empty);
        }
        let upper = trimmed.to_ascii_uppercase();
        if let Some((_, wkt)) = WELL_KNOWN
            .iter()
            .find(|(aliases, _)| aliases.iter().any(|a| *a == upper))
        {
            return Self::from_wkt(wkt);
        }
        if upper.starts_with("GEOGCS") || upper.starts_with("PROJCS") || upper.starts_with("LOCAL_CS")
        {
            return Self::from_wkt(trimmed);
        }
        Err(SrsError::UnknownInput(trimmed.to_string()))
    }

    /// Semantic equality: names and authority codes are ignored.
    pub fn is_same(&self, other: &SpatialReference) -> bool {
        match (self, other) {
            (Self::Geographic(a), Self::Geographic(b)) => same_geographic(a, b),
            (Self::Projected(a), Self::Projected(b)) => same_projected(a, b),
            (Self::Local(a), Self::Local(b)) => normalize_name(a) == normalize_name(b),
            _ => false,
        }
    }

    pub fn to_wkt(&self) -> String {
        let mut out = String::new();
        self.to_node().render(&mut out, None);
        out
    }

    /// Multi-line WKT for diagnostics.
    pub fn to_pretty_wkt(&self) -> String {
        let mut out = String::new();
        self.to_node().render(&mut out, Some(0));
        out
    }

    fn to_node(&self) -> WktNode {
        match self {
            Self::Geographic(g) => geographic_node(g),
            Self::Projected(p) => {
                let mut node = WktNode::new("PROJCS")
                    .text(&p.name)
                    .node(geographic_node(&p.geographic))
                    .node(WktNode::new("PROJECTION").text(&p.projection));
                for (name, value) in &p.parameters {
                    node = node.node(WktNode::new("PARAMETER").text(name).number(*value));
                }
                node.node(
                    WktNode::new("UNIT")
                        .text(&p.linear_unit_name)
                        .number(p.linear_unit),
                )
            }
            Self::Local(name) => WktNode::new("LOCAL_CS").text(name),
        }
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}

fn geographic_from(node: &WktNode) -> SrsResult<GeographicCrs> {
    let datum = node.require("DATUM")?;
    let spheroid = datum.require("SPHEROID")?;
    let (prime_meridian_name, prime_meridian) = match node.child("PRIMEM") {
        Some(pm) => (pm.name(), pm.number_at(0, "longitude")?),
        None => ("Greenwich".to_string(), 0.0),
    };
    let unit = node.require("UNIT")?;
    Ok(GeographicCrs {
        name: node.name(),
        datum: datum.name(),
        spheroid: spheroid.name(),
        semi_major: spheroid.number_at(0, "semi-major axis")?,
        inverse_flattening: spheroid.number_at(1, "inverse flattening")?,
        prime_meridian_name,
        prime_meridian,
        angular_unit_name: unit.name(),
        angular_unit: unit.number_at(0, "conversion factor")?,
    })
}

fn projected_from(node: &WktNode) -> SrsResult<ProjectedCrs> {
    let geographic = geographic_from(node.require("GEOGCS")?)?;
    let projection = node.require("PROJECTION")?.name();
    let mut parameters = BTreeMap::new();
    for p in node.children("PARAMETER") {
        parameters.insert(normalize_name(&p.name()), p.number_at(0, "value")?);
    }
    let (linear_unit_name, linear_unit) = match node.child("UNIT") {
        Some(unit) => (unit.name(), unit.number_at(0, "conversion factor")?),
        None => ("metre".to_string(), 1.0),
    };
    Ok(ProjectedCrs {
        name: node.name(),
        geographic,
        projection,
        parameters,
        linear_unit_name,
        linear_unit,
    })
}

fn geographic_node(g: &GeographicCrs) -> WktNode {
    WktNode::new("GEOGCS")
        .text(&g.name)
        .node(
            WktNode::new("DATUM").text(&g.datum).node(
                WktNode::new("SPHEROID")
                    .text(&g.spheroid)
                    .number(g.semi_major)
                    .number(g.inverse_flattening),
            ),
        )
        .node(
            WktNode::new("PRIMEM")
                .text(&g.prime_meridian_name)
                .number(g.prime_meridian),
        )
        .node(
            WktNode::new("UNIT")
                .text(&g.angular_unit_name)
                .number(g.angular_unit),
        )
}

/// Lowercase, non-alphanumerics folded to single underscores, ESRI `D_`
/// datum prefix removed.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    trimmed.strip_prefix("d_").unwrap_or(trimmed).to_string()
}

fn close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= PARAMETER_TOLERANCE * scale
}

fn same_geographic(a: &GeographicCrs, b: &GeographicCrs) -> bool {
    normalize_name(&a.datum) == normalize_name(&b.datum)
        && close(a.semi_major, b.semi_major)
        && close(a.inverse_flattening, b.inverse_flattening)
        && close(a.prime_meridian, b.prime_meridian)
        && close(a.angular_unit, b.angular_unit)
}

fn same_projected(a: &ProjectedCrs, b: &ProjectedCrs) -> bool {
    same_geographic(&a.geographic, &b.geographic)
        && normalize_name(&a.projection) == normalize_name(&b.projection)
        && close(a.linear_unit, b.linear_unit)
        && a.parameters.len() == b.parameters.len()
        && a
            .parameters
            .iter()
            .all(|(k, v)| b.parameters.get(k).is_some_and(|w| close(*v, *w)))
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Normalize user SRS input (WKT, `EPSG:n`, well-known name) to WKT.
pub fn user_srs_to_wkt(input: &str) -> SrsResult<String> {
    Ok(SpatialReference::from_user_input(input)?.to_wkt())
}

/// Semantic comparison of an expected user-input SRS against a dataset's WKT.
/// Two empty definitions are equal; an empty one never equals a defined one.
/// An invalid expected SRS is an error, while dataset WKT that does not parse
/// is a mismatch.
pub fn compare_spatial_reference(expected: &str, actual_wkt: &str) -> SrsResult<bool> {
    if expected.trim().is_empty() {
        return Ok(actual_wkt.trim().is_empty());
    }
    let expected = SpatialReference::from_user_input(expected)?;
    Ok(SpatialReference::from_wkt(actual_wkt)
        .map(|actual| expected.is_same(&actual))
        .unwrap_or(false))
}

/// Semantic comparison of two WKT strings.
pub fn wkt_equivalent(expected_wkt: &str, got_wkt: &str) -> SrsResult<bool> {
    match (expected_wkt.trim().is_empty(), got_wkt.trim().is_empty()) {
        (true, true) => Ok(true),
        (true, false) | (false, true) => Ok(false),
        (false, false) => Ok(SpatialReference::from_wkt(expected_wkt)?
            .is_same(&SpatialReference::from_wkt(got_wkt)?)),
    }
}

/// [`wkt_equivalent`], posting `SRS differs from expected.` on mismatch.
pub fn equal_srs_from_wkt(ctx: &mut RunContext, expected_wkt: &str, got_wkt: &str) -> SrsResult<bool> {
    let same = wkt_equivalent(expected_wkt, got_wkt)?;
    if !same {
        tracing::warn!(expected = %expected_wkt, got = %got_wkt, "spatial references differ");
        ctx.post_reason("SRS differs from expected.");
    }
    Ok(same)
}
