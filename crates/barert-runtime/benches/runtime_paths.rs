//! Hot paths generated code hits on every call: the resolved-binding fast
//! path, span element access and allocation bookkeeping.

use std::cell::UnsafeCell;
use std::ffi::{CStr, c_void};
use std::ptr::NonNull;

use barert_runtime::abi::{MethodFixupCell, ModuleFixupCell, TypeDescriptor};
use barert_runtime::heap::{HostAllocator, allocate_array};
use barert_runtime::interop::{SymbolLoader, resolve};
use barert_runtime::{ReadOnlySpan, Span, StringRef};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

static INT32: TypeDescriptor = TypeDescriptor::value_type(4, 0x400);
static INT32_ARRAY: TypeDescriptor = TypeDescriptor::value_array(&INT32, 4, 0x401);

/// Hands out the same zeroed block on every call, so iterations don't leak.
struct RecyclingHeap {
    block: UnsafeCell<Vec<u64>>,
}

impl RecyclingHeap {
    fn new(bytes: usize) -> Self {
        Self {
            block: UnsafeCell::new(vec![0; bytes.div_ceil(8)]),
        }
    }
}

impl HostAllocator for RecyclingHeap {
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let block = unsafe { &mut *self.block.get() };
        if size > block.len() * 8 {
            return None;
        }
        block.fill(0);
        NonNull::new(block.as_mut_ptr().cast())
    }
}

struct NeverLoads;

impl SymbolLoader for NeverLoads {
    fn load_module(&self, _name: &CStr) -> Option<NonNull<c_void>> {
        unreachable!("bound cells never reach the loader")
    }

    fn resolve_symbol(&self, _module: NonNull<c_void>, _name: &CStr) -> Option<NonNull<c_void>> {
        unreachable!("bound cells never reach the loader")
    }
}

fn bench_resolve(c: &mut Criterion) {
    let mut module = ModuleFixupCell::new(c"libdemo.so".as_ptr());
    let mut cell = MethodFixupCell::new(c"demo".as_ptr(), &mut module);
    cell.target = 0x1000 as *mut c_void;

    c.bench_function("resolve_bound_cell", |b| {
        b.iter(|| unsafe { resolve(black_box(&mut cell), &NeverLoads) });
    });
}

fn bench_spans(c: &mut Criterion) {
    let heap = RecyclingHeap::new(8192);
    let array = allocate_array(&heap, &INT32_ARRAY, 1024);
    Span::<i32>::from_array(Some(array)).fill(3);

    let mut group = c.benchmark_group("span");
    group.bench_function("indexed_sum_1024", |b| {
        b.iter(|| {
            let span = ReadOnlySpan::<i32>::from_array(black_box(Some(array)));
            (0..span.len()).map(|i| span[i]).sum::<i32>()
        });
    });
    group.bench_function("slice_sum_1024", |b| {
        b.iter(|| {
            let span = ReadOnlySpan::<i32>::from_array(black_box(Some(array)));
            span.to_slice().iter().sum::<i32>()
        });
    });
    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let heap = RecyclingHeap::new(4096);

    let mut group = c.benchmark_group("allocation");
    group.bench_function("int32_array_64", |b| {
        b.iter(|| allocate_array(&heap, &INT32_ARRAY, black_box(64)));
    });
    group.bench_function("narrow_string_32", |b| {
        b.iter(|| StringRef::from_narrow(&heap, black_box(b"abcdefghijklmnopqrstuvwxyz012345")));
    });
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_spans, bench_allocation);
criterion_main!(benches);
