//! Demo: watch one caller identity through a hooked dispatch slot
//!
//! Builds the in-memory host, loads the hooking module with a filter on
//! identity 1000, issues calls from a matching and a non-matching caller,
//! then unloads and verifies the table is bit-for-bit restored.
//!
//! Run with: cargo run --example watch_caller

use std::sync::OnceLock;
use tablehook::{
    handler_addr, CallerFilter, CallerHost, CallerId, HookModule, Interceptor, LogSink, MemHost,
    ModuleConfig, SlotHandler,
};

const SYMBOL: &str = "dispatch_table";
const SLOT: usize = 257;
const WATCHED: CallerId = CallerId(1000);

struct Ctx {
    host: MemHost,
    interceptor: Interceptor<LogSink>,
}

static CTX: OnceLock<Ctx> = OnceLock::new();

/// the table entry the module installs: fetch the caller identity from the
/// host, then hand off to the interceptor
unsafe extern "C" fn watched_entry(
    a: usize,
    b: usize,
    c: usize,
    d: usize,
    e: usize,
    f: usize,
) -> isize {
    let ctx = CTX.get().expect("context");
    ctx.interceptor
        .dispatch(ctx.host.caller_identity(), [a, b, c, d, e, f])
}

/// stand-in for the host's original slot implementation
unsafe extern "C" fn original_entry(
    a: usize,
    b: usize,
    _c: usize,
    _d: usize,
    _e: usize,
    _f: usize,
) -> isize {
    a.wrapping_add(b) as isize
}

fn call(host: &MemHost, args: [usize; 6]) -> isize {
    let addr = host.peek_slot(SLOT);
    // SAFETY: the slot only ever holds original_entry or watched_entry
    let entry: SlotHandler = unsafe { std::mem::transmute(addr) };
    // SAFETY: dispatching a live entry with a full argument set
    unsafe { entry(args[0], args[1], args[2], args[3], args[4], args[5]) }
}

fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!("[{:5}][{}] {}", record.level(), record.target(), msg))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

fn main() {
    setup_logging().expect("logger");

    println!("Dispatch Table Hooking Demo");
    println!("===========================\n");

    let mut host = MemHost::new(512);
    host.export_symbol(SYMBOL);
    host.fill_slots(handler_addr(original_entry));
    let interceptor = Interceptor::new(watched_entry, CallerFilter::watch(WATCHED), "watch", LogSink);
    CTX.set(Ctx { host, interceptor }).map_err(|_| ()).expect("context");
    let ctx = CTX.get().unwrap();

    let before = ctx.host.peek_slot(SLOT);
    println!("slot {SLOT} before load: {before:#x}");

    let config =
        ModuleConfig::from_params("1000", SYMBOL, "512", None).expect("module parameters");
    let module = match HookModule::load(&ctx.host, config, SLOT, &ctx.interceptor) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("load failed: {e}");
            return;
        }
    };
    println!("slot {SLOT} after load:  {:#x}\n", ctx.host.peek_slot(SLOT));

    // a watched caller: reported, result untouched
    ctx.host.set_identity(WATCHED);
    let out = call(&ctx.host, [40, 2, 0, 0, 0, 0]);
    println!("caller {WATCHED} -> result {out} (reported above)\n");

    // an unwatched caller: silent, result untouched
    ctx.host.set_identity(CallerId(0));
    let out = call(&ctx.host, [40, 2, 0, 0, 0, 0]);
    println!("caller 0    -> result {out} (no report)\n");

    let restored = module.unload();
    let after = ctx.host.peek_slot(SLOT);
    println!("unloaded: {restored} hook(s) restored");
    println!(
        "slot {SLOT} after unload: {after:#x} ({})",
        if after == before { "bit-for-bit restored" } else { "MISMATCH" }
    );
}
