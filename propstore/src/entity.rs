// An entity is an opaque identity token the store never looks inside: a
// class, a method, a field, or a compound tuple made up by a client
// analysis. All the store needs from it is cheap cloning, identity
// comparison, and a hash — it never orders entities against one another.

use std::fmt::Debug;
use std::hash::Hash;

/// Blanket-implemented for any type usable as an entity identity. Mirrors
/// the "any type with these bounds is data" pattern used for message
/// payloads elsewhere in this workspace: no type needs to opt in by hand.
pub trait Entity: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
impl<T> Entity for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
