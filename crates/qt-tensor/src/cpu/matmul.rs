// Matmul helper module.
//
// The core matmul and batched matmul implementations live in
// CpuBackend (cpu/mod.rs). This module is reserved for future
// optimizations such as tiled/blocked matmul, SIMD kernels, or
// cache-friendly access patterns.
