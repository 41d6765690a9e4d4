use hashbrown::HashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::error::Error;
use std::fmt;

use wfc_image::BuildError;

/// Anything that stops a job from running: malformed XML, missing files or
/// attributes, rules that name unknown tiles. All of these are fatal;
/// contradictions during synthesis are not errors and never appear here.
#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(String),
    Xml(String),
    MissingAttribute {
        element: String,
        attribute: String,
    },
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    UnknownTile(String),
    UnknownSymmetry {
        tile: String,
        symmetry: String,
    },
    OrientationOutOfRange {
        tile: String,
        orientation: u32,
    },
    Image {
        path: String,
        message: String,
    },
    Io(String),
    Build(BuildError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "file not found: {}", path),
            ConfigError::Xml(message) => write!(f, "XML error: {}", message),
            ConfigError::MissingAttribute { element, attribute } => {
                write!(f, "missing attribute '{}' in <{}>", attribute, element)
            }
            ConfigError::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "invalid value '{}' for attribute '{}' in <{}>",
                value, attribute, element
            ),
            ConfigError::UnknownTile(name) => write!(f, "unknown tile name: {}", name),
            ConfigError::UnknownSymmetry { tile, symmetry } => {
                write!(f, "unknown symmetry '{}' for tile '{}'", symmetry, tile)
            }
            ConfigError::OrientationOutOfRange { tile, orientation } => {
                write!(f, "orientation {} out of range for tile '{}'", orientation, tile)
            }
            ConfigError::Image { path, message } => {
                write!(f, "image error for {}: {}", path, message)
            }
            ConfigError::Io(message) => write!(f, "io error: {}", message),
            ConfigError::Build(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ConfigError {}

impl From<BuildError> for ConfigError {
    fn from(e: BuildError) -> Self {
        ConfigError::Build(e)
    }
}

/// Attributes common to every job element.
#[derive(Debug, Clone)]
pub struct JobHeader {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub periodic: bool,
    pub screenshots: u32,
}

#[derive(Debug, Clone)]
pub enum Job {
    Overlapping {
        header: JobHeader,
        pattern_size: u32,
        symmetry: u32,
        periodic_input: bool,
        ground: bool,
    },
    SimpleTiled {
        header: JobHeader,
        subset: String,
    },
    ImageMosaic {
        header: JobHeader,
        subset: String,
    },
}

impl Job {
    pub fn header(&self) -> &JobHeader {
        match self {
            Job::Overlapping { header, .. }
            | Job::SimpleTiled { header, .. }
            | Job::ImageMosaic { header, .. } => header,
        }
    }
}

pub(crate) type Attributes = HashMap<String, String>;

pub(crate) fn attributes(element: &BytesStart) -> Result<Attributes, ConfigError> {
    let mut map = HashMap::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| ConfigError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ConfigError::Xml(e.to_string()))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

pub(crate) fn required(
    attrs: &Attributes,
    element: &str,
    attribute: &str,
) -> Result<String, ConfigError> {
    attrs
        .get(attribute)
        .cloned()
        .ok_or_else(|| ConfigError::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        })
}

fn invalid(element: &str, attribute: &str, value: &str) -> ConfigError {
    ConfigError::InvalidAttribute {
        element: element.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

pub(crate) fn u32_attribute(
    attrs: &Attributes,
    element: &str,
    attribute: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    match attrs.get(attribute) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| invalid(element, attribute, value)),
    }
}

pub(crate) fn f64_attribute(
    attrs: &Attributes,
    element: &str,
    attribute: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match attrs.get(attribute) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| invalid(element, attribute, value)),
    }
}

pub(crate) fn bool_attribute(
    attrs: &Attributes,
    element: &str,
    attribute: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match attrs.get(attribute).map(String::as_str) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(value) => Err(invalid(element, attribute, value)),
    }
}

fn header(attrs: &Attributes, element: &str, default_size: u32) -> Result<JobHeader, ConfigError> {
    let size = u32_attribute(attrs, element, "size", default_size)?;
    Ok(JobHeader {
        name: required(attrs, element, "name")?,
        width: u32_attribute(attrs, element, "width", size)?,
        height: u32_attribute(attrs, element, "height", size)?,
        periodic: bool_attribute(attrs, element, "periodic", false)?,
        screenshots: u32_attribute(attrs, element, "screenshots", 2)?,
    })
}

/// Parse a job file: a root element whose `simpletiled`, `overlapping` and
/// `imagemosaic` children each describe one synthesis.
pub fn parse_jobs(xml: &str) -> Result<Vec<Job>, ConfigError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut jobs = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                match element.name().as_ref() {
                    b"overlapping" => {
                        let attrs = attributes(&element)?;
                        jobs.push(Job::Overlapping {
                            header: header(&attrs, "overlapping", 48)?,
                            pattern_size: u32_attribute(&attrs, "overlapping", "N", 3)?,
                            symmetry: u32_attribute(&attrs, "overlapping", "symmetry", 8)?,
                            periodic_input: bool_attribute(
                                &attrs,
                                "overlapping",
                                "periodicInput",
                                true,
                            )?,
                            ground: bool_attribute(&attrs, "overlapping", "ground", false)?,
                        });
                    }
                    b"simpletiled" => {
                        let attrs = attributes(&element)?;
                        jobs.push(Job::SimpleTiled {
                            header: header(&attrs, "simpletiled", 24)?,
                            subset: attrs
                                .get("subset")
                                .cloned()
                                .unwrap_or_else(|| "tiles".to_string()),
                        });
                    }
                    b"imagemosaic" => {
                        let attrs = attributes(&element)?;
                        jobs.push(Job::ImageMosaic {
                            header: header(&attrs, "imagemosaic", 24)?,
                            subset: attrs
                                .get("subset")
                                .cloned()
                                .unwrap_or_else(|| "tiles".to_string()),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConfigError::Xml(e.to_string())),
            _ => {}
        }
    }
    Ok(jobs)
}
