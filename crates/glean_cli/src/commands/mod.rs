pub(crate) mod meta;
pub(crate) mod read;
pub(crate) mod search;
pub(crate) mod shared;
pub(crate) mod tree;
