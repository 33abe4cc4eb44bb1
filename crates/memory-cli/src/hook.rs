//! Hook-install utility (spec §4.11): writes a host-specific hook
//! script to a fixed path and marks it executable. Failures are logged
//! and swallowed rather than propagated — per spec, "hook entry points
//! swallow errors and exit successfully to avoid breaking the host
//! agent" applies to the installer too, not just the hook script it
//! writes.

use std::path::PathBuf;

const HOOK_SCRIPT: &str = r#"#!/bin/sh
# Installed by `cortex-memory hooks install`. Reads a JSON turn
# ({"user_message", "assistant_message", "session_id", "project"}) on
# stdin and feeds it to the capture pipeline. Never fails the host
# agent: errors are logged to stderr and the hook still exits 0.
cortex-memory remember --stdin "$@" 2>>"$HOME/.cortex-memory/hook.log"
exit 0
"#;

/// Fixed install path: `~/.claude/hooks/post-turn/cortex-memory.sh`,
/// matching the host agent's per-event hook directory convention.
pub fn default_hook_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude/hooks/post-turn/cortex-memory.sh"))
}

/// Write the hook script and chmod it executable. Swallows every
/// failure (missing home dir, unwritable path, non-unix chmod) and
/// logs instead, returning whether the install actually succeeded so
/// the CLI can print a friendly status line without propagating an
/// error code to the host agent's setup flow.
pub fn install() -> bool {
    let Some(path) = default_hook_path() else {
        tracing::warn!("could not determine home directory, skipping hook install");
        return false;
    };
    install_at(&path)
}

fn install_at(path: &PathBuf) -> bool {
    let Some(parent) = path.parent() else {
        tracing::warn!(path = %path.display(), "hook path has no parent directory");
        return false;
    };
    if let Err(err) = std::fs::create_dir_all(parent) {
        tracing::warn!(error = %err, path = %parent.display(), "failed to create hook directory");
        return false;
    }
    if let Err(err) = std::fs::write(path, HOOK_SCRIPT) {
        tracing::warn!(error = %err, path = %path.display(), "failed to write hook script");
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
            tracing::warn!(error = %err, path = %path.display(), "failed to chmod hook script executable");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_script_at_a_writable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooks/post-turn/cortex-memory.sh");
        assert!(install_at(&path));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("cortex-memory remember"));
    }

    #[cfg(unix)]
    #[test]
    fn installed_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hook.sh");
        assert!(install_at(&path));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn unwritable_parent_fails_without_panicking() {
        // A path whose parent is itself a file (not a directory) can
        // never be created; the installer should report failure, not
        // panic.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let path = blocker.join("hook.sh");
        assert!(!install_at(&path));
    }
}
