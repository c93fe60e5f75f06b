//! Entities: records that keep their identity while their state changes.

use core::fmt;
use core::hash::Hash;

pub trait Entity {
    /// Lower-case noun used in messages ("product", "customer").
    const KIND: &'static str;

    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    fn id(&self) -> &Self::Id;

    /// `"<kind> <id>"`, as used in store errors.
    fn describe(&self) -> String {
        format!("{} {}", Self::KIND, self.id())
    }
}
