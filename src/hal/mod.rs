pub mod arch;

pub use arch::{activate, active_token};
pub use arch::{console_getchar, console_output, console_putchar, halt, halted, push_console_input, shutdown};
pub use arch::{get_time, set_next_trigger};
pub use arch::{intr_disable, intr_enable, intr_get_level, intr_set_level, InterruptGuard, IntrLevel};
pub use arch::INTR_MASKING_INFO;
pub use arch::{in_interrupt, intr_yield_on_return, post_external_interrupt, raise_timer_interrupt, trap_handler, wait_for_interrupt, Irq};
pub use arch::{__switch, live_contexts, run_on_boot_context, ContextEntry, TaskContext};
pub use arch::{KERNEL_STACK_SIZE, PAGE_SIZE, PAGE_SIZE_BITS};
