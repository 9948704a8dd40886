/// Foreground window inspection.
///
/// The monitor only needs a snapshot of "what has focus right now". Any OS
/// failure while taking it (window closed mid-query, access denied) yields
/// `None` for that poll.
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};

pub const UNKNOWN_PROCESS: &str = "Unknown";
pub const INACCESSIBLE_PROCESS: &str = "Unknown/Access Denied";

/// Snapshot of the focused top-level window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: String,
    pub pid: u32,
    pub process_name: String,
}

pub trait WindowInspector: Send + Sync {
    fn foreground_window(&self) -> Option<WindowInfo>;
}

/// Inspector backed by `GetForegroundWindow` and the process table.
pub struct ForegroundWindowInspector {
    system: Mutex<System>,
}

impl ForegroundWindowInspector {
    /// Returns `None` on platforms without a foreground window API.
    pub fn new() -> Option<Self> {
        if cfg!(windows) {
            Some(Self {
                system: Mutex::new(System::new()),
            })
        } else {
            None
        }
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    fn process_name(&self, pid: u32) -> String {
        if pid == 0 {
            return UNKNOWN_PROCESS.to_string();
        }
        let Ok(mut sys) = self.system.lock() else {
            return INACCESSIBLE_PROCESS.to_string();
        };
        let pid = Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid)
            .map(|p| p.name().to_string_lossy().into_owned())
            .unwrap_or_else(|| INACCESSIBLE_PROCESS.to_string())
    }
}

impl WindowInspector for ForegroundWindowInspector {
    fn foreground_window(&self) -> Option<WindowInfo> {
        #[cfg(windows)]
        {
            let (title, pid) = imp::foreground_title_and_pid()?;
            Some(WindowInfo {
                title,
                pid,
                process_name: self.process_name(pid),
            })
        }
        #[cfg(not(windows))]
        {
            None
        }
    }
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    };

    pub fn foreground_title_and_pid() -> Option<(String, u32)> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd == HWND::default() {
                return None;
            }

            let len = GetWindowTextLengthW(hwnd).max(0) as usize;
            let mut buf = vec![0u16; len + 1];
            let copied = GetWindowTextW(hwnd, &mut buf).max(0) as usize;
            let title = String::from_utf16_lossy(&buf[..copied.min(len)]);

            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
            Some((title, pid))
        }
    }
}

// ── Test double ───────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::fake::ScriptedInspector;
    use super::*;

    #[test]
    fn scripted_inspector_replays_in_order() {
        let inspector = ScriptedInspector::titles(&["Chrome", "Notepad"]);
        assert_eq!(inspector.foreground_window().unwrap().title, "Chrome");
        assert_eq!(inspector.foreground_window().unwrap().title, "Notepad");
        assert!(inspector.foreground_window().is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn foreground_inspector_is_unavailable_off_windows() {
        assert!(ForegroundWindowInspector::new().is_none());
    }

    #[cfg(windows)]
    #[test]
    fn pid_zero_is_unknown_process() {
        let inspector = ForegroundWindowInspector::new().unwrap();
        assert_eq!(inspector.process_name(0), UNKNOWN_PROCESS);
    }
}
