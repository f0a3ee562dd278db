//! Test utilities for building configured VMs.
