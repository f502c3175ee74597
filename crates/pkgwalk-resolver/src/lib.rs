//! Resolution engine: picks asset groups for a platform, walks dependency
//! graphs depth-first through package sources, installs each discovered
//! package once per session, and checks the consistency of the result.

pub mod consistency;
pub mod install;
pub mod selector;
pub mod walker;
