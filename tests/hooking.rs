//! End-to-end interception behavior on the in-memory host

mod common;

use common::{call_through, original_entry, CountSink, POISON_ARG};
use std::sync::OnceLock;
use tablehook::{
    handler_addr, CallerFilter, CallerHost, CallerId, HookError, HookManager, HookModule,
    HookState, Interceptor, MemHost, ModuleConfig, ProtectionToggle, TableView,
};

const SYMBOL: &str = "dispatch_table";
const WATCH_SLOT: usize = 257;

struct Ctx {
    host: MemHost,
    interceptor: Interceptor<CountSink>,
}

fn make_ctx(len: usize, watch: CallerId, entry: tablehook::SlotHandler) -> Ctx {
    let mut host = MemHost::new(len);
    host.export_symbol(SYMBOL);
    host.fill_slots(handler_addr(original_entry));
    let interceptor = Interceptor::new(entry, CallerFilter::watch(watch), "watch", CountSink::new());
    Ctx { host, interceptor }
}

// each through-the-table test gets its own static context: the table entry
// is a plain extern fn with no room for a context argument, same as on a
// real host

static SCENARIO: OnceLock<Ctx> = OnceLock::new();

unsafe extern "C" fn scenario_entry(
    a: usize,
    b: usize,
    c: usize,
    d: usize,
    e: usize,
    f: usize,
) -> isize {
    let ctx = SCENARIO.get().expect("scenario context");
    ctx.interceptor
        .dispatch(ctx.host.caller_identity(), [a, b, c, d, e, f])
}

#[test]
fn watched_identity_is_reported_and_forwarded() {
    SCENARIO
        .set(make_ctx(512, CallerId(1000), scenario_entry))
        .map_err(|_| ())
        .expect("scenario context set once");
    let ctx = SCENARIO.get().unwrap();
    let before = ctx.host.peek_slot(WATCH_SLOT);

    let config = ModuleConfig::from_params("1000", SYMBOL, "512", None).expect("params");
    let module = HookModule::load(&ctx.host, config, WATCH_SLOT, &ctx.interceptor).expect("load");
    assert_eq!(ctx.host.peek_slot(WATCH_SLOT), handler_addr(scenario_entry));

    // matched caller: one report, untouched result
    ctx.host.set_identity(CallerId(1000));
    assert_eq!(call_through(&ctx.host, WATCH_SLOT, [3, 4, 0, 0, 0, 0]), 7);
    assert_eq!(ctx.interceptor.sink().count(), 1);

    // error codes propagate byte for byte
    assert_eq!(
        call_through(&ctx.host, WATCH_SLOT, [POISON_ARG, 0, 0, 0, 0, 0]),
        -14
    );
    assert_eq!(ctx.interceptor.sink().count(), 2);

    // unmatched caller: no report, same result
    ctx.host.set_identity(CallerId(0));
    assert_eq!(call_through(&ctx.host, WATCH_SLOT, [5, 5, 0, 0, 0, 0]), 10);
    assert_eq!(ctx.interceptor.sink().count(), 2);

    // unload puts the slot back bit for bit
    assert_eq!(module.unload(), 1);
    assert_eq!(ctx.host.peek_slot(WATCH_SLOT), before);

    // post-unload calls go straight to the original, reporting nothing
    ctx.host.set_identity(CallerId(1000));
    assert_eq!(call_through(&ctx.host, WATCH_SLOT, [3, 4, 0, 0, 0, 0]), 7);
    assert_eq!(ctx.interceptor.sink().count(), 2);
}

static TRANSPARENT: OnceLock<Ctx> = OnceLock::new();

unsafe extern "C" fn transparent_entry(
    a: usize,
    b: usize,
    c: usize,
    d: usize,
    e: usize,
    f: usize,
) -> isize {
    let ctx = TRANSPARENT.get().expect("transparency context");
    ctx.interceptor
        .dispatch(ctx.host.caller_identity(), [a, b, c, d, e, f])
}

#[test]
fn unmatched_caller_sees_identical_results() {
    TRANSPARENT
        .set(make_ctx(64, CallerId(1000), transparent_entry))
        .map_err(|_| ())
        .expect("transparency context set once");
    let ctx = TRANSPARENT.get().unwrap();
    ctx.host.set_identity(CallerId(0));

    let slot = 9;
    let arg_sets: [[usize; 6]; 4] = [
        [0, 0, 0, 0, 0, 0],
        [1, 2, 3, 4, 5, 6],
        [POISON_ARG, 7, 0, 0, 0, 0],
        [100_000, 23, 0, 0, 0, 0],
    ];
    let baseline: Vec<isize> = arg_sets
        .iter()
        .map(|args| call_through(&ctx.host, slot, *args))
        .collect();

    // SAFETY: the host's slot storage outlives the local manager
    let table = unsafe { TableView::from_raw(ctx.host.table_base(), ctx.host.table_len()) }
        .expect("table view");
    let mgr = HookManager::new(table, ProtectionToggle::new(&ctx.host));
    mgr.install(slot, &ctx.interceptor).expect("install");

    let hooked: Vec<isize> = arg_sets
        .iter()
        .map(|args| call_through(&ctx.host, slot, *args))
        .collect();
    assert_eq!(hooked, baseline);
    assert_eq!(ctx.interceptor.sink().count(), 0);

    mgr.uninstall(slot).expect("uninstall");
}

#[test]
fn second_uninstall_reports_not_found() {
    // no through-the-table call here, so everything can stay local
    let host = MemHost::new(64);
    host.fill_slots(handler_addr(original_entry));
    // SAFETY: host outlives the manager
    let table =
        unsafe { TableView::from_raw(host.table_base(), host.table_len()) }.expect("table view");
    let mgr = HookManager::new(table, ProtectionToggle::new(&host));
    let hook = Interceptor::new(
        scenario_entry,
        CallerFilter::watch(CallerId(1)),
        "watch",
        CountSink::new(),
    );

    mgr.install(11, &hook).expect("install");
    let record = mgr.uninstall(11).expect("uninstall");
    assert_eq!(record.state, HookState::Restored);
    assert_eq!(
        mgr.uninstall(11).unwrap_err(),
        HookError::RecordNotFound { slot: 11 }
    );
}

#[test]
fn protection_count_returns_to_zero_across_failures() {
    let host = MemHost::new(64);
    host.fill_slots(handler_addr(original_entry));
    // SAFETY: host outlives the manager
    let table =
        unsafe { TableView::from_raw(host.table_base(), host.table_len()) }.expect("table view");
    let mgr = HookManager::new(table, ProtectionToggle::new(&host));
    let hook = Interceptor::new(
        scenario_entry,
        CallerFilter::watch(CallerId(1)),
        "watch",
        CountSink::new(),
    );

    // clean round trip
    mgr.install(5, &hook).expect("install");
    mgr.uninstall(5).expect("uninstall");
    assert_eq!(mgr.toggle().suppress_count(), 0);

    // suppress failure at install
    host.fail_next_suppress();
    assert!(mgr.install(5, &hook).is_err());
    assert_eq!(mgr.toggle().suppress_count(), 0);

    // restore failure at uninstall
    mgr.install(5, &hook).expect("install");
    host.fail_next_restore();
    assert!(matches!(
        mgr.uninstall(5),
        Err(HookError::ProtectionToggleFailed { .. })
    ));
    assert_eq!(mgr.toggle().suppress_count(), 0);
    // the slot itself was still written back
    assert_eq!(host.peek_slot(5), handler_addr(original_entry));
}
