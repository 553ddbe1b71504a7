/// Vulkan validation messages - forwarded to the engine logger
///
/// The debug messenger callback routes every validation layer message through
/// the engine's logging macros and keeps per-severity counters plus a count of
/// repeated messages, printed as a colored report when the device shuts down.

use ash::vk;
use colored::*;
use prism_engine::{engine_debug, engine_error, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Log source of validation layer messages
pub const VALIDATION_LOG_SOURCE: &str = "prism::vulkan::validation";

/// Whether the callback forwards messages (set between init and shutdown)
static ENABLED: AtomicBool = AtomicBool::new(false);

/// Global validation statistics (thread-safe atomic counters)
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences of every distinct message
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn counter(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> &AtomicU32 {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        }
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Reset the statistics and start forwarding messages
pub fn init_validation() {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    ENABLED.store(true, Ordering::Release);
}

/// Stop forwarding messages and print the report
pub fn shutdown_validation() {
    if ENABLED.swap(false, Ordering::AcqRel) {
        print_validation_stats_report();
    }
}

/// Get current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Number of distinct messages seen more than once
fn repeated_message_count() -> usize {
    MESSAGE_TRACKER
        .lock()
        .ok()
        .and_then(|tracker| tracker.as_ref().map(|m| m.values().filter(|&&n| n > 1).count()))
        .unwrap_or(0)
}

fn track_message(message: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let tracker = guard.get_or_insert_with(FxHashMap::default);
    let count = tracker.entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let repeated = repeated_message_count();
    if repeated > 0 {
        println!("\n  {} message(s) appeared multiple times", repeated);
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

/// Build the create info of the debug messenger
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Vulkan debug messenger callback
///
/// Never asks Vulkan to abort the call that triggered the message.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if !ENABLED.load(Ordering::Acquire) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    VALIDATION_STATS.counter(message_severity).fetch_add(1, Ordering::Relaxed);

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrences = track_message(message);
    let repeat = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(VALIDATION_LOG_SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id_name, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(VALIDATION_LOG_SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id_name, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_debug!(VALIDATION_LOG_SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id_name, message);
    } else {
        engine_trace!(VALIDATION_LOG_SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id_name, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_stats_total() {
        let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
        assert_eq!(stats.total(), 10);
    }

    #[test]
    #[serial]
    fn test_init_resets_counters() {
        VALIDATION_STATS.counter(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR).fetch_add(2, Ordering::Relaxed);
        init_validation();
        assert_eq!(get_validation_stats(), ValidationStats::default());
        ENABLED.store(false, Ordering::Release);
    }

    #[test]
    #[serial]
    fn test_counter_selects_highest_severity() {
        VALIDATION_STATS.reset();
        VALIDATION_STATS
            .counter(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::INFO)
            .fetch_add(1, Ordering::Relaxed);
        VALIDATION_STATS.counter(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE).fetch_add(1, Ordering::Relaxed);
        let stats = get_validation_stats();
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.verbose, 1);
        assert_eq!(stats.info, 0);
    }

    #[test]
    #[serial]
    fn test_repeated_messages_are_counted() {
        init_validation();
        assert_eq!(track_message("same"), 1);
        assert_eq!(track_message("same"), 2);
        track_message("other");
        assert_eq!(repeated_message_count(), 1);
        ENABLED.store(false, Ordering::Release);
    }
}
