use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use redact_core::{Element, MemorySurface, ResourceId, Root};

const SECTION_COUNT: usize = 4;
const ROWS_PER_SECTION: usize = 32;
const ROW_SAMPLES: &[usize] = &[8, 16, 32, 64];

fn page(sections: usize, rows_per_section: usize, generation: usize) -> Element {
    Element::host("main").children_from((0..sections).map(|section| {
        Element::host("section")
            .child(Element::host("h2").child(format!("Section {section}")))
            .children_from((0..rows_per_section).map(move |row| {
                Element::host("div")
                    .attr("data-row", row)
                    .child(Element::host("span").child(format!("Item {section}-{row}")))
                    .child(Element::host("span").child(format!("Detail {generation}")))
            }))
    }))
}

fn fiber_count(sections: usize, rows_per_section: usize) -> usize {
    2 + sections * (3 + rows_per_section * 5)
}

struct PageFixture {
    root: Root<MemorySurface>,
    container: ResourceId,
    sections: usize,
    rows_per_section: usize,
    generation: usize,
}

impl PageFixture {
    fn new(sections: usize, rows_per_section: usize) -> Self {
        let mut root = Root::new(MemorySurface::new());
        let container = root.adapter_mut().create_container("body");
        Self {
            root,
            container,
            sections,
            rows_per_section,
            generation: 0,
        }
    }

    fn render(&mut self) {
        self.generation += 1;
        self.root.render(
            page(self.sections, self.rows_per_section, self.generation),
            self.container,
        );
        self.root.flush().expect("render pass");
        self.root.adapter_mut().take_calls();
    }
}

fn bench_rerender(c: &mut Criterion) {
    let mut fixture = PageFixture::new(SECTION_COUNT, ROWS_PER_SECTION);
    // Mount first so the steady-state update path is measured.
    fixture.render();

    c.bench_function("reconcile_rerender", |b| {
        b.iter(|| {
            fixture.render();
            black_box(fixture.root.current().map(|tree| tree.len()));
        });
    });
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_mount");
    for &rows_per_section in ROW_SAMPLES {
        group.bench_with_input(
            BenchmarkId::new("fibers", fiber_count(SECTION_COUNT, rows_per_section)),
            &rows_per_section,
            |b, &rows_per_section| {
                b.iter(|| {
                    let mut fixture = PageFixture::new(SECTION_COUNT, rows_per_section);
                    fixture.render();
                    black_box(fixture.root.adapter().len());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(reconcile, bench_rerender, bench_mount);
criterion_main!(reconcile);
