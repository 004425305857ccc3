use super::model::Node;

pub const OUTPUT_SUFFIX: &str = "_out";
pub const INPUT_SUFFIX: &str = "_in";
// channel accepted on either side regardless of the other's channel
pub const ANY_CHANNEL: &str = "any";

/// Decides whether an edge may join two ports. Returns the rejection reason.
pub trait PortPolicy {
    fn check(&self, source: &Node, source_handle: &str, target: &Node, target_handle: &str) -> Result<(), String>;
}

/// Accepts everything except self-loops.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl PortPolicy for AcceptAll {
    fn check(&self, source: &Node, _: &str, target: &Node, _: &str) -> Result<(), String> {
        if source.id == target.id {
            return Err("a node cannot connect to itself".into());
        }
        Ok(())
    }
}

/// Typed handles: `<channel>_out` feeds `<channel>_in` of the same channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypedPorts;

pub fn channel_of<'a>(handle: &'a str, suffix: &str) -> Option<&'a str> {
    handle.strip_suffix(suffix).filter(|c| !c.is_empty())
}

impl PortPolicy for TypedPorts {
    fn check(&self, source: &Node, source_handle: &str, target: &Node, target_handle: &str) -> Result<(), String> {
        AcceptAll.check(source, source_handle, target, target_handle)?;
        let Some(out) = channel_of(source_handle, OUTPUT_SUFFIX) else {
            return Err(format!("'{}' is not an output port", source_handle));
        };
        let Some(inp) = channel_of(target_handle, INPUT_SUFFIX) else {
            return Err(format!("'{}' is not an input port", target_handle));
        };
        if out == inp || out == ANY_CHANNEL || inp == ANY_CHANNEL {
            Ok(())
        } else {
            Err(format!("{} output cannot feed a {} input", out, inp))
        }
    }
}
