use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dotmatrix_core::cpu_lr35902::{BusLr35902, CpuLr35902};

/// Flat 64 KiB memory with a small looping program at 0x0100.
struct BenchBus {
    ram: Vec<u8>,
}

impl BenchBus {
    fn new() -> Self {
        let mut ram = vec![0; 0x10000];
        let program: &[u8] = &[
            0x21, 0x00, 0xC0, // LD HL,C000
            0x3E, 0x42, // LD A,42
            0x22, // LD (HL+),A
            0x80, // ADD A,B
            0x27, // DAA
            0xCB, 0x37, // SWAP A
            0xC5, // PUSH BC
            0xD1, // POP DE
            0x34, // INC (HL)
            0xCB, 0x46, // BIT 0,(HL)
            0xCD, 0x00, 0x02, // CALL 0200
            0xC3, 0x00, 0x01, // JP 0100
        ];
        ram[0x0100..0x0100 + program.len()].copy_from_slice(program);
        ram[0x0200] = 0xC9; // RET
        Self { ram }
    }
}

impl BusLr35902 for BenchBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.ram[addr as usize] = val;
    }

    fn tick(&mut self) {}

    fn pending_interrupts(&self) -> u8 {
        0
    }

    fn acknowledge_interrupt(&mut self) -> Option<u16> {
        None
    }
}

fn make_cpu() -> CpuLr35902<BenchBus> {
    let mut cpu = CpuLr35902::new(BenchBus::new());
    cpu.regs.pc = 0x0100;
    cpu.regs.sp = 0xFFFE;
    cpu
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_lr35902_step");

    group.bench_function("single_instruction", |b| {
        let mut cpu = make_cpu();
        b.iter(|| {
            black_box(cpu.step());
        });
    });

    group.finish();
}

fn bench_cpu_multiple_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_lr35902_multiple_steps");

    for step_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(step_count),
            step_count,
            |b, &count| {
                b.iter(|| {
                    let mut cpu = make_cpu();
                    for _ in 0..count {
                        cpu.step();
                    }
                    black_box(cpu.cycles);
                });
            },
        );
    }

    group.finish();
}

fn bench_cpu_frame(c: &mut Criterion) {
    // One video frame is 17556 machine cycles.
    c.bench_function("cpu_lr35902_frame", |b| {
        let mut cpu = make_cpu();
        b.iter(|| {
            let target = cpu.cycles + 17556;
            while cpu.cycles < target {
                cpu.step();
            }
            black_box(cpu.regs.a());
        });
    });
}

criterion_group!(
    benches,
    bench_cpu_step,
    bench_cpu_multiple_steps,
    bench_cpu_frame
);
criterion_main!(benches);
