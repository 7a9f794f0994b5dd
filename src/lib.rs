// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal dotfile synchronization and activation.
//!
//! Dotswitch tracks configuration files and folders, mirrors them into a
//! version controlled __workspace__ clone, and toggles each of them between
//! two states: linked into the file system as a symlink into the clone, or
//! left behind as a plain file.
//!
//! # Contexts
//!
//! Which dotfiles are live depends on the working __context__ the user is
//! bound to. A remote metadata service keeps one document per tracked
//! dotfile, telling dotswitch which context a dotfile belongs to and in what
//! order to activate it. Switching context unlinks every dotfile that competes
//! for the same source path before linking the dotfiles of the new context.
//!
//! # Portable Paths
//!
//! Source paths under the home directory are stored with a `{{HOME}}`
//! placeholder, so the same dotfile index works for users with different home
//! directories.
//!
//! # See Also
//!
//! 1. [ArchWiki - dotfiles](https://wiki.archlinux.org/title/Dotfiles)

pub mod activate;
pub mod address;
pub mod config;
pub mod context;
pub mod encrypt;
pub mod hooks;
pub mod manager;
pub mod path;
pub mod prompt;
pub mod remote;
pub mod store;
pub mod vcs;

#[cfg(test)]
pub(crate) mod testing;
