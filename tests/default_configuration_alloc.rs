// The send_ui fallback for unknown contexts hands out the shared default document without allocating.
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ffi::{CString, c_void};
use std::ptr;

use tileplug::abi::{get_decoder, tile_decoder_t};
use tileplug::api::PluginStatus;

struct CountingAllocator;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|count| count.set(count.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

fn table() -> *mut tile_decoder_t {
    let table = get_decoder();
    assert!(!table.is_null());
    table
}

fn send_ui(context: *mut c_void) -> (PluginStatus, *const u8, usize) {
    let send = unsafe { (*table()).sendui }.unwrap();
    let mut buffer: *const u8 = ptr::null();
    let mut len = 0usize;
    let status = unsafe { send(context, &mut buffer, &mut len) };
    (status, buffer, len)
}

fn closed_context() -> *mut c_void {
    let name = CString::new("sheet").unwrap();
    let open = unsafe { (*table()).open }.unwrap();
    let close = unsafe { (*table()).close }.unwrap();
    let mut context: *mut c_void = ptr::null_mut();
    assert_eq!(unsafe { open(name.as_ptr(), &mut context) }, PluginStatus::Ok);
    assert_eq!(unsafe { close(context) }, PluginStatus::Ok);
    context
}

#[test]
fn fallback_send_ui_never_allocates() {
    let stale = closed_context();
    let contexts = [
        ptr::null_mut(),
        ptr::without_provenance_mut(0x7777_0001),
        stale,
    ];
    let (_, expected, expected_len) = send_ui(ptr::null_mut());
    for context in contexts {
        send_ui(context);
    }

    for context in contexts {
        let before = allocations();
        for _ in 0..100 {
            let (status, buffer, len) = send_ui(context);
            assert_eq!(status, PluginStatus::Ok);
            assert_eq!(buffer, expected);
            assert_eq!(len, expected_len);
        }
        assert_eq!(allocations() - before, 0, "fallback send_ui allocated for {context:p}");
    }
}
