use std::fmt;

use proxima_geom::Vec3;
use serde::Deserialize;

use crate::codec::{OscArg, OscMessage};

/// Entry of the `/instance/users` JSON payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InstanceUser {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// One decoded inbound message, already mapped to its meaning.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    HeadPosition(Vec3),
    HeadRotation { x: f32, y: f32, z: f32, w: f32 },
    UserPosition { id: String, coords: Vec3 },
    UserJoin { id: String, name: Option<String> },
    UserLeave { id: String },
    AvatarParameter { name: String, value: OscArg },
    InstanceUsers(Vec<InstanceUser>),
    WorldScale(f32),
    VisibilityAck { path: String, args: Vec<OscArg> },
}

#[derive(Debug)]
pub enum RouteError {
    UnknownAddress(String),
    Arity {
        addr: String,
        expected: usize,
        got: usize,
    },
    ArgType {
        addr: String,
        index: usize,
    },
    EmptySegment(String),
    Json(serde_json::Error),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::UnknownAddress(a) => write!(f, "unrouted address {}", a),
            RouteError::Arity {
                addr,
                expected,
                got,
            } => write!(f, "{} expects {} argument(s), got {}", addr, expected, got),
            RouteError::ArgType { addr, index } => {
                write!(f, "{}: argument {} has the wrong type", addr, index)
            }
            RouteError::EmptySegment(a) => write!(f, "{}: empty path segment", a),
            RouteError::Json(e) => write!(f, "instance user list: {}", e),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouteError::Json(e) => Some(e),
            _ => None,
        }
    }
}

/// Maps OSC addresses onto [`Inbound`] variants. Only the avatar parameter prefix is
/// configurable; the rest of the address space is fixed.
#[derive(Clone, Debug)]
pub struct Router {
    parameter_prefix: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new("/avatar/parameters/")
    }
}

fn need(msg: &OscMessage, n: usize) -> Result<(), RouteError> {
    if msg.args.len() < n {
        return Err(RouteError::Arity {
            addr: msg.addr.clone(),
            expected: n,
            got: msg.args.len(),
        });
    }
    Ok(())
}

fn float_at(msg: &OscMessage, index: usize) -> Result<f32, RouteError> {
    msg.args[index].as_f32().ok_or_else(|| RouteError::ArgType {
        addr: msg.addr.clone(),
        index,
    })
}

fn vec3_args(msg: &OscMessage) -> Result<Vec3, RouteError> {
    need(msg, 3)?;
    Ok(Vec3::new(
        float_at(msg, 0)?,
        float_at(msg, 1)?,
        float_at(msg, 2)?,
    ))
}

impl Router {
    pub fn new(parameter_prefix: impl Into<String>) -> Self {
        let mut parameter_prefix = parameter_prefix.into();
        if !parameter_prefix.ends_with('/') {
            parameter_prefix.push('/');
        }
        Self { parameter_prefix }
    }

    pub fn parameter_prefix(&self) -> &str {
        &self.parameter_prefix
    }

    pub fn route(&self, msg: &OscMessage) -> Result<Inbound, RouteError> {
        let addr = msg.addr.as_str();
        match addr {
            "/tracking/head/position" => return vec3_args(msg).map(Inbound::HeadPosition),
            "/tracking/head/rotation" => {
                need(msg, 4)?;
                return Ok(Inbound::HeadRotation {
                    x: float_at(msg, 0)?,
                    y: float_at(msg, 1)?,
                    z: float_at(msg, 2)?,
                    w: float_at(msg, 3)?,
                });
            }
            "/instance/users" => {
                need(msg, 1)?;
                let raw = msg.args[0].as_str().ok_or_else(|| RouteError::ArgType {
                    addr: msg.addr.clone(),
                    index: 0,
                })?;
                let users: Vec<InstanceUser> =
                    serde_json::from_str(raw).map_err(RouteError::Json)?;
                return Ok(Inbound::InstanceUsers(users));
            }
            "/world/scale" => {
                need(msg, 1)?;
                return Ok(Inbound::WorldScale(float_at(msg, 0)?));
            }
            _ => {}
        }

        if let Some(name) = addr.strip_prefix(self.parameter_prefix.as_str()) {
            if name.is_empty() {
                return Err(RouteError::EmptySegment(msg.addr.clone()));
            }
            need(msg, 1)?;
            return Ok(Inbound::AvatarParameter {
                name: name.to_string(),
                value: msg.args[0].clone(),
            });
        }

        if let Some(rest) = addr.strip_prefix("/visibility/") {
            return Ok(Inbound::VisibilityAck {
                path: rest.to_string(),
                args: msg.args.clone(),
            });
        }

        if let Some(rest) = addr.strip_prefix("/user/") {
            let (id, verb) = rest
                .rsplit_once('/')
                .ok_or_else(|| RouteError::UnknownAddress(msg.addr.clone()))?;
            if id.is_empty() || id.contains('/') {
                return Err(RouteError::EmptySegment(msg.addr.clone()));
            }
            let id = id.to_string();
            return match verb {
                "position" => Ok(Inbound::UserPosition {
                    id,
                    coords: vec3_args(msg)?,
                }),
                "join" => Ok(Inbound::UserJoin {
                    id,
                    name: msg
                        .args
                        .first()
                        .and_then(OscArg::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                }),
                "leave" => Ok(Inbound::UserLeave { id }),
                _ => Err(RouteError::UnknownAddress(msg.addr.clone())),
            };
        }

        Err(RouteError::UnknownAddress(msg.addr.clone()))
    }
}
